//! Error types for the Glimpse script interpreter.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Preprocessor error on line {line}: {message}")]
    Preprocess { line: usize, message: String },

    #[error("Undefined name: {0}")]
    Undefined(String),

    #[error("Ambiguous name '{name}', provided by modules: {}", .modules.join(", "))]
    Ambiguous { name: String, modules: Vec<String> },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The interpreter's own state can no longer be trusted.
    #[error("Internal interpreter error: {0}")]
    Internal(String),
}

impl Error {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            line,
            message: message.into(),
        }
    }

    pub fn preprocess(line: usize, message: impl Into<String>) -> Self {
        Error::Preprocess {
            line,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime(message.into())
    }

    /// Whether the session that produced this error must be thrown away.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}
