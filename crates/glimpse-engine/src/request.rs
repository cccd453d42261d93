//! Requests and results.

use std::time::Duration;

use glimpse_script::{Diagnostic, Value};
use serde::{Deserialize, Serialize};

/// One unit of work for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RequestFields", into = "RequestFields")]
pub enum EvaluationRequest {
    /// Declarations are evaluated first, then the value expression. Either
    /// may be absent or empty.
    Code {
        declarations: Option<String>,
        value_expression: Option<String>,
    },
    /// Construct `type_name` and populate it from `markup`.
    Markup { markup: String, type_name: String },
}

impl EvaluationRequest {
    pub fn code(declarations: impl Into<String>, value_expression: impl Into<String>) -> Self {
        EvaluationRequest::Code {
            declarations: Some(declarations.into()),
            value_expression: Some(value_expression.into()),
        }
    }

    pub fn declarations(declarations: impl Into<String>) -> Self {
        EvaluationRequest::Code {
            declarations: Some(declarations.into()),
            value_expression: None,
        }
    }

    pub fn expression(value_expression: impl Into<String>) -> Self {
        EvaluationRequest::Code {
            declarations: None,
            value_expression: Some(value_expression.into()),
        }
    }

    pub fn markup(markup: impl Into<String>, type_name: impl Into<String>) -> Self {
        EvaluationRequest::Markup {
            markup: markup.into(),
            type_name: type_name.into(),
        }
    }
}

/// Flat wire form of [`EvaluationRequest`].
///
/// Markup wins: when `markup` is present the code fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declarations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup_type: Option<String>,
}

impl From<RequestFields> for EvaluationRequest {
    fn from(fields: RequestFields) -> Self {
        match fields.markup {
            Some(markup) => EvaluationRequest::Markup {
                markup,
                type_name: fields.markup_type.unwrap_or_default(),
            },
            None => EvaluationRequest::Code {
                declarations: fields.declarations,
                value_expression: fields.value_expression,
            },
        }
    }
}

impl From<EvaluationRequest> for RequestFields {
    fn from(request: EvaluationRequest) -> Self {
        match request {
            EvaluationRequest::Code {
                declarations,
                value_expression,
            } => RequestFields {
                declarations,
                value_expression,
                ..Default::default()
            },
            EvaluationRequest::Markup { markup, type_name } => RequestFields {
                markup: Some(markup),
                markup_type: Some(type_name),
                ..Default::default()
            },
        }
    }
}

/// The outcome of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    /// Diagnostics reported while this request ran, in order.
    pub messages: Vec<Diagnostic>,
    /// Time spent in the handler.
    pub duration: Duration,
    /// `None` when nothing was produced. `Some(Value::Null)` is a real null.
    pub value: Option<Value>,
}

impl EvaluationResult {
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(|m| m.is_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_wins_over_code() {
        let json = r#"{"declarations": "let x = 1", "markup": "<Label/>", "markup_type": "ui.Label"}"#;
        let request: EvaluationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request, EvaluationRequest::markup("<Label/>", "ui.Label"));
    }

    #[test]
    fn test_code_request_from_wire() {
        let request: EvaluationRequest = serde_json::from_str(r#"{"value_expression": "1 + 1"}"#).unwrap();
        assert_eq!(request, EvaluationRequest::expression("1 + 1"));
    }

    #[test]
    fn test_wire_form_is_flat() {
        let json = serde_json::to_value(EvaluationRequest::markup("<A/>", "A")).unwrap();
        assert_eq!(json, serde_json::json!({"markup": "<A/>", "markup_type": "A"}));
    }

    #[test]
    fn test_null_counts_as_value() {
        let result = EvaluationResult {
            messages: Vec::new(),
            duration: Duration::ZERO,
            value: Some(Value::Null),
        };
        assert!(result.has_value());
        assert!(!result.has_errors());
    }
}
