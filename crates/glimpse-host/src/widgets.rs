//! A small widget set so the console host has something to preview.

use std::collections::HashMap;

use glimpse_script::{Module, TypeDef, Value};

use crate::config::WIDGET_NAMESPACE;

pub const MODULE_NAME: &str = "widgets";

fn text() -> Value {
    Value::String(String::new())
}

pub fn module() -> Module {
    let ns = WIDGET_NAMESPACE;
    Module::new(MODULE_NAME)
        .with_type(
            TypeDef::view(ns, "Label")
                .property("Text", text())
                .property("FontSize", Value::Number(14.0))
                .property("TextColor", Value::String("Black".to_string())),
        )
        .with_type(
            TypeDef::view(ns, "Button")
                .property("Text", text())
                .property("IsEnabled", Value::Boolean(true)),
        )
        .with_type(
            TypeDef::view(ns, "Entry")
                .property("Text", text())
                .property("Placeholder", text()),
        )
        .with_type(
            TypeDef::view(ns, "StackLayout")
                .property("Orientation", Value::String("Vertical".to_string()))
                .property("Spacing", Value::Number(6.0))
                .container(),
        )
        .with_type(
            TypeDef::page(ns, "ContentPage")
                .property("Title", Value::Null)
                .property("Content", Value::Null)
                .property("BindingContext", Value::Null),
        )
        .with_type(TypeDef::new("app", "GreetingViewModel").property("Greeting", text()))
        .with_function(ns, "alert", |ctx, args| {
            let text: Vec<String> = args.iter().map(Value::to_string_value).collect();
            ctx.warn(format!("alert: {}", text.join(" ")));
            Ok(Value::Null)
        })
}

/// Binding contexts for the preview surface, keyed by page type.
pub fn view_models() -> HashMap<String, Value> {
    let greeting = TypeDef::new("app", "GreetingViewModel")
        .property("Greeting", Value::String("Hello from the view model".to_string()))
        .instantiate();
    HashMap::from([(format!("{}.ContentPage", WIDGET_NAMESPACE), Value::Object(greeting))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widgets_are_usable_from_script() {
        let mut interp = glimpse_script::Interpreter::new();
        interp.reference(std::sync::Arc::new(module()));
        interp
            .evaluate("use ui; let stack = new StackLayout(); let label = new Label(); label.Text = \"hi\";")
            .unwrap();
        let label = interp.evaluate("label").unwrap().unwrap();
        assert_eq!(
            label.as_object().unwrap().get("Text"),
            Some(&Value::String("hi".to_string()))
        );
        assert!(interp.evaluate("stack").unwrap().unwrap().as_object().unwrap().is_container());
    }

    #[test]
    fn test_view_model_for_content_page() {
        let models = view_models();
        assert!(models.contains_key("ui.ContentPage"));
    }
}
