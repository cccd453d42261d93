//! The JSON line written for each request.

use glimpse_engine::{EngineError, EvaluationResult};
use glimpse_script::Diagnostic;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct EvaluationReport {
    pub messages: Vec<Diagnostic>,
    pub duration_ms: f64,
    pub has_value: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Set when the request never produced a result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&EvaluationResult> for EvaluationReport {
    fn from(result: &EvaluationResult) -> Self {
        Self {
            messages: result.messages.clone(),
            duration_ms: result.duration.as_micros() as f64 / 1000.0,
            has_value: result.has_value(),
            value: result.value.as_ref().map(|v| v.to_json_value()),
            error: None,
        }
    }
}

impl EvaluationReport {
    pub fn failed(error: impl ToString) -> Self {
        Self {
            messages: Vec::new(),
            duration_ms: 0.0,
            has_value: false,
            value: None,
            error: Some(error.to_string()),
        }
    }

    pub fn from_outcome(outcome: &Result<EvaluationResult, EngineError>) -> Self {
        match outcome {
            Ok(result) => result.into(),
            Err(err) => Self::failed(err),
        }
    }
}
