//! Presenting results: pages and views go on a modal preview surface, and
//! failures go on an error screen.

use std::collections::HashMap;

use glimpse_script::{Object, ObjectKind, Value};
use serde::Serialize;
use tracing::info;

use crate::error::EngineError;
use crate::request::EvaluationResult;

/// Type of the page synthesized around a bare view.
pub const CONTENT_PAGE: &str = "ContentPage";
pub const CONTENT_PROPERTY: &str = "Content";
pub const BINDING_CONTEXT_PROPERTY: &str = "BindingContext";

/// What the error screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorViewModel {
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorViewModel {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn from_engine_error(err: &EngineError) -> Self {
        Self::new("Evaluation failed", err.to_string())
    }

    /// The error diagnostics of `result`, or `None` if there are none.
    pub fn from_result(result: &EvaluationResult) -> Option<Self> {
        let errors: Vec<_> = result.errors().collect();
        let first = errors.first()?;
        let message = errors.iter().map(|d| d.text.as_str()).collect::<Vec<_>>().join("\n");
        let mut model = Self::new("Evaluation error", message);
        model.detail = first.detail.clone();
        Some(model)
    }
}

/// One screen on the preview surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Page(Object),
    Error(ErrorViewModel),
}

/// The modal container a host shows previews in.
pub trait PreviewSurface {
    fn show(&mut self);
    fn hide(&mut self);
    fn display(&mut self, screen: &Screen);
}

/// Drives a [`PreviewSurface`] from evaluation results.
pub struct Previewer<S> {
    surface: S,
    presented: bool,
    /// Binding contexts keyed by the qualified type name of the result.
    view_models: HashMap<String, Value>,
}

impl<S: PreviewSurface> Previewer<S> {
    pub fn new(surface: S, view_models: HashMap<String, Value>) -> Self {
        Self {
            surface,
            presented: false,
            view_models,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn is_presented(&self) -> bool {
        self.presented
    }

    /// Show the result's page or view. Returns whether anything was shown.
    pub fn preview(&mut self, result: &EvaluationResult) -> bool {
        let Some(Value::Object(obj)) = &result.value else {
            return false;
        };
        info!(type_name = %obj.qualified_name(), "Previewing");

        let mut page = match obj.kind {
            ObjectKind::Page => obj.clone(),
            ObjectKind::View => content_page(obj.clone()),
            ObjectKind::Other => return false,
        };
        if let Some(view_model) = self.view_models.get(&obj.qualified_name()) {
            page.properties
                .insert(BINDING_CONTEXT_PROPERTY.to_string(), view_model.clone());
        }

        self.ensure_presented();
        self.surface.display(&Screen::Page(page));
        true
    }

    pub fn notify_error(&mut self, error: ErrorViewModel) {
        self.ensure_presented();
        self.surface.display(&Screen::Error(error));
    }

    /// Hide the surface. The next preview presents it again.
    pub fn dismiss(&mut self) {
        if self.presented {
            self.surface.hide();
            self.presented = false;
        }
    }

    fn ensure_presented(&mut self) {
        if !self.presented {
            self.surface.show();
            self.presented = true;
        }
    }
}

fn content_page(view: Object) -> Object {
    let mut page = Object::new("", CONTENT_PAGE, ObjectKind::Page);
    page.properties
        .insert(CONTENT_PROPERTY.to_string(), Value::Object(view));
    page
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use glimpse_script::Diagnostic;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        screens: Vec<Screen>,
    }

    impl PreviewSurface for Recorder {
        fn show(&mut self) {
            self.events.push("show".to_string());
        }

        fn hide(&mut self) {
            self.events.push("hide".to_string());
        }

        fn display(&mut self, screen: &Screen) {
            self.events.push("display".to_string());
            self.screens.push(screen.clone());
        }
    }

    fn result(value: Option<Value>) -> EvaluationResult {
        EvaluationResult {
            messages: Vec::new(),
            duration: Duration::ZERO,
            value,
        }
    }

    fn object(kind: ObjectKind) -> Value {
        Value::Object(Object::new("ui", "Thing", kind))
    }

    #[test]
    fn test_view_is_wrapped_in_page() {
        let mut previewer = Previewer::new(Recorder::default(), HashMap::new());
        assert!(previewer.preview(&result(Some(object(ObjectKind::View)))));

        let Screen::Page(page) = &previewer.surface().screens[0] else {
            panic!("Expected a page");
        };
        assert_eq!(page.type_name, CONTENT_PAGE);
        assert_eq!(page.get(CONTENT_PROPERTY), Some(&object(ObjectKind::View)));
    }

    #[test]
    fn test_presented_once() {
        let mut previewer = Previewer::new(Recorder::default(), HashMap::new());
        previewer.preview(&result(Some(object(ObjectKind::Page))));
        previewer.preview(&result(Some(object(ObjectKind::Page))));
        assert_eq!(previewer.surface().events, vec!["show", "display", "display"]);

        previewer.dismiss();
        previewer.notify_error(ErrorViewModel::new("t", "m"));
        assert_eq!(
            previewer.surface().events,
            vec!["show", "display", "display", "hide", "show", "display"]
        );
    }

    #[test]
    fn test_other_values_are_ignored() {
        let mut previewer = Previewer::new(Recorder::default(), HashMap::new());
        assert!(!previewer.preview(&result(Some(Value::Number(1.0)))));
        assert!(!previewer.preview(&result(Some(object(ObjectKind::Other)))));
        assert!(!previewer.preview(&result(None)));
        assert!(!previewer.is_presented());
    }

    #[test]
    fn test_view_model_becomes_binding_context() {
        let view_models = HashMap::from([("ui.Thing".to_string(), Value::String("vm".to_string()))]);
        let mut previewer = Previewer::new(Recorder::default(), view_models);
        previewer.preview(&result(Some(object(ObjectKind::Page))));
        let Screen::Page(page) = &previewer.surface().screens[0] else {
            panic!("Expected a page");
        };
        assert_eq!(
            page.get(BINDING_CONTEXT_PROPERTY),
            Some(&Value::String("vm".to_string()))
        );
    }

    #[test]
    fn test_error_model_from_result() {
        let mut failed = result(None);
        assert_eq!(ErrorViewModel::from_result(&failed), None);
        failed.messages.push(Diagnostic::info("noise"));
        failed.messages.push(Diagnostic::error("boom").with_detail("trace"));
        let model = ErrorViewModel::from_result(&failed).unwrap();
        assert_eq!(model.message, "boom");
        assert_eq!(model.detail.as_deref(), Some("trace"));
    }
}
