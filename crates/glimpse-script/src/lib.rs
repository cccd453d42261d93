//! Glimpse script interpreter with a persistent interactive session.
//!
//! This crate provides a small expression language that a running host
//! evaluates snippet by snippet. Bindings, functions and imports survive
//! across calls to [`Interpreter::evaluate`]. Host code contributes native
//! functions and object types through [`Module`]s.

pub mod ast;
mod builtins;
mod diagnostic;
mod error;
mod eval;
mod interpreter;
mod lexer;
mod module;
mod parser;
mod preprocess;
mod runtime;
mod value;

pub use builtins::{core_module, CORE_MODULE, MAX_SEQUENCE_LEN};
pub use diagnostic::{Diagnostic, DiagnosticSender, Severity};
pub use error::Error;
pub use interpreter::{Interpreter, Settings, DEFAULT_MAX_CALL_DEPTH};
pub use module::{HostContext, Module, NativeFunction, TypeDef};
pub use parser::{parse, MAX_NESTING};
pub use preprocess::preprocess;
pub use runtime::{Runtime, MAX_EXPR_NESTING};
pub use value::{Function, Object, ObjectKind, Value};

/// Result type for interpreter operations.
pub type Result<T> = std::result::Result<T, Error>;
