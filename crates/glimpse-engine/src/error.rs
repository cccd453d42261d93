//! Error types for the evaluation engine.

use std::time::Duration;

use thiserror::Error;

/// How bad an evaluation failure is for the session that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad user code. The session stays usable.
    Recoverable,
    /// The evaluator's own state is broken. The session must be rebuilt.
    FatalCorruption,
}

/// A failed evaluation as reported through the evaluator seam.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct EvalFailure {
    pub kind: FailureKind,
    pub message: String,
    pub detail: Option<String>,
}

impl EvalFailure {
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Recoverable,
            message: message.into(),
            detail: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::FatalCorruption,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == FailureKind::FatalCorruption
    }
}

/// Errors raised while applying markup to a constructed instance.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkupError {
    #[error("Markup syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    #[error("Markup has no root element")]
    Empty,

    #[error("Root element <{found}> does not match type '{expected}'")]
    RootMismatch { expected: String, found: String },

    #[error("Type '{type_name}' has no property '{property}'")]
    UnknownProperty { type_name: String, property: String },

    #[error("Invalid value '{value}' for property '{property}': expected {expected}")]
    BadValue {
        property: String,
        value: String,
        expected: String,
    },

    #[error("Cannot construct <{element}>: {failure}")]
    Construction { element: String, failure: EvalFailure },

    #[error("<{parent}> cannot contain child elements")]
    ChildrenNotAllowed { parent: String },

    #[error("<{element}> does not accept text content")]
    TextNotAllowed { element: String },
}

impl MarkupError {
    pub fn syntax(position: u64, message: impl Into<String>) -> Self {
        MarkupError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub fn construction(element: impl Into<String>, failure: EvalFailure) -> Self {
        MarkupError::Construction {
            element: element.into(),
            failure,
        }
    }

    /// Whether building a child element corrupted the evaluator.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MarkupError::Construction { failure, .. } if failure.is_fatal())
    }
}

/// Failures around the dispatcher's exclusive section.
///
/// Nothing that happens inside a handler surfaces here; those outcomes are
/// carried as diagnostics in the result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Evaluation was cancelled before it started")]
    Cancelled,

    #[error("Evaluation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("UI thread is no longer running")]
    UiThreadGone,

    #[error("Job panicked on the UI thread")]
    JobPanicked,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
