//! Request handlers. They run on the UI thread inside the dispatcher's
//! exclusive section and never return errors: failures become diagnostics.

use glimpse_script::Value;
use tracing::{error, info};

use crate::diagnostics::DiagnosticSink;
use crate::error::EvalFailure;
use crate::evaluator::Evaluator;
use crate::markup::{construct, EvaluatorInstanceFactory, MarkupLoader};
use crate::request::EvaluationRequest;

/// What a handler produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Handled {
    pub value: Option<Value>,
    /// Set when the session can no longer be trusted.
    pub corrupted: bool,
}

impl Handled {
    fn value(value: Option<Value>) -> Self {
        Self {
            value,
            corrupted: false,
        }
    }

    fn failed(failure: &EvalFailure, sink: &DiagnosticSink) -> Self {
        sink.error(failure);
        Self {
            value: None,
            corrupted: failure.is_fatal(),
        }
    }
}

pub fn handle(
    request: &EvaluationRequest,
    evaluator: &mut dyn Evaluator,
    sink: &DiagnosticSink,
    loader: &dyn MarkupLoader,
) -> Handled {
    match request {
        EvaluationRequest::Code {
            declarations,
            value_expression,
        } => handle_code(declarations.as_deref(), value_expression.as_deref(), evaluator, sink),
        EvaluationRequest::Markup { markup, type_name } => {
            handle_markup(markup, type_name, evaluator, sink, loader)
        }
    }
}

/// Evaluate declarations, then the value expression. Empty parts are
/// skipped. The first failure stops the request.
pub fn handle_code(
    declarations: Option<&str>,
    value_expression: Option<&str>,
    evaluator: &mut dyn Evaluator,
    sink: &DiagnosticSink,
) -> Handled {
    let mut value = None;
    for code in [declarations, value_expression].into_iter().flatten() {
        if code.is_empty() {
            continue;
        }
        match evaluator.evaluate(code) {
            Ok(result) => value = result,
            Err(failure) => return Handled::failed(&failure, sink),
        }
    }
    Handled::value(value)
}

/// Construct `type_name` and populate it from `markup`.
pub fn handle_markup(
    markup: &str,
    type_name: &str,
    evaluator: &mut dyn Evaluator,
    sink: &DiagnosticSink,
    loader: &dyn MarkupLoader,
) -> Handled {
    info!(type_name, "Loading markup");

    let mut instance = match construct(evaluator, type_name) {
        Ok(instance) => instance,
        Err(failure) => {
            error!(type_name, error = %failure, "Failed to construct markup target");
            return Handled::failed(&failure, sink);
        }
    };

    let mut factory = EvaluatorInstanceFactory::new(evaluator);
    match loader.load(&mut instance, markup, &mut factory) {
        Ok(()) => {
            info!(type_name = %instance.qualified_name(), "Markup loaded");
            Handled::value(Some(Value::Object(instance)))
        }
        Err(err) => {
            error!(type_name, error = %err, "Failed to load markup");
            let failure = if err.is_fatal() {
                EvalFailure::fatal(err.to_string())
            } else {
                EvalFailure::recoverable(err.to_string())
            };
            Handled::failed(&failure.with_detail(format!("{:?}", err)), sink)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use super::*;
    use crate::evaluator::{EvaluatorFactory, EvaluatorSettings, ScriptEvaluatorFactory};
    use crate::markup::XmlMarkupLoader;
    use glimpse_script::{Module, Severity, TypeDef};

    fn setup() -> (Box<dyn Evaluator>, DiagnosticSink) {
        let sink = DiagnosticSink::new();
        let mut evaluator = ScriptEvaluatorFactory::new()
            .create(EvaluatorSettings {
                symbols: BTreeSet::new(),
                sink: sink.sender(),
            })
            .unwrap();
        evaluator.reference(Arc::new(
            Module::new("widgets")
                .with_type(TypeDef::view("ui", "Label").property("Text", Value::String(String::new())))
                .with_function("ui", "answer", |_, _| Ok(Value::Number(42.0))),
        ));
        (evaluator, sink)
    }

    #[test]
    fn test_declarations_only_has_no_value() {
        let (mut eval, sink) = setup();
        let handled = handle_code(Some("let x = 1;"), None, eval.as_mut(), &sink);
        assert_eq!(handled, Handled::default());
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_value_expression_wins() {
        let (mut eval, sink) = setup();
        let handled = handle_code(Some("let x = 2;"), Some("x * ui.answer()"), eval.as_mut(), &sink);
        assert_eq!(handled.value, Some(Value::Number(84.0)));
    }

    #[test]
    fn test_empty_parts_are_skipped() {
        let (mut eval, sink) = setup();
        let handled = handle_code(Some(""), Some(""), eval.as_mut(), &sink);
        assert_eq!(handled.value, None);
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_failure_is_one_error() {
        let (mut eval, sink) = setup();
        let handled = handle_code(Some("let y = nope;"), Some("1"), eval.as_mut(), &sink);
        assert_eq!(handled.value, None);
        assert!(!handled.corrupted);
        let messages = sink.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Error);
    }

    #[test]
    fn test_markup_target_must_be_object() {
        let (mut eval, sink) = setup();
        let handled = handle_markup("<x/>", "ui.answer", eval.as_mut(), &sink, &XmlMarkupLoader);
        assert_eq!(handled.value, None);
        assert_eq!(sink.drain().len(), 1);
    }

    #[test]
    fn test_markup_populates_instance() {
        let (mut eval, sink) = setup();
        let handled = handle_markup(r#"<Label Text="hey"/>"#, "ui.Label", eval.as_mut(), &sink, &XmlMarkupLoader);
        let value = handled.value.unwrap();
        assert_eq!(
            value.as_object().unwrap().get("Text"),
            Some(&Value::String("hey".to_string()))
        );
    }
}
