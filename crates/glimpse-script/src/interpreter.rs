//! The Glimpse script interpreter.
//!
//! An [`Interpreter`] owns one [`Runtime`] and evaluates snippets against it
//! one at a time. Nothing here is thread-safe by itself; hosts that evaluate
//! from several threads serialize access.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::builtins::core_module;
use crate::diagnostic::DiagnosticSender;
use crate::error::Error;
use crate::eval;
use crate::module::Module;
use crate::parser;
use crate::preprocess::preprocess;
use crate::runtime::Runtime;
use crate::value::Value;

/// Maximum nesting of script function calls before a runtime error.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Construction settings for an [`Interpreter`].
#[derive(Debug, Clone)]
pub struct Settings {
    /// Symbols visible to `#if` directives.
    pub symbols: BTreeSet<String>,
    /// Where `print` output and warnings go. Stderr when absent.
    pub sink: Option<DiagnosticSender>,
    pub max_call_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            symbols: BTreeSet::new(),
            sink: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Settings {
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbols.insert(symbol.into());
        self
    }

    pub fn sink(mut self, sink: DiagnosticSender) -> Self {
        self.sink = Some(sink);
        self
    }
}

/// A persistent interactive session.
///
/// Every interpreter references the `core` module at construction.
///
/// Evaluation recurses on the native stack. Running up to
/// [`DEFAULT_MAX_CALL_DEPTH`] calls or [`MAX_EXPR_NESTING`](crate::MAX_EXPR_NESTING)
/// levels needs more than the 2 MiB a spawned thread gets by default.
#[derive(Debug)]
pub struct Interpreter {
    runtime: Runtime,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let mut runtime = Runtime::new(settings.symbols, settings.sink, settings.max_call_depth);
        runtime.reference(Arc::new(core_module()));
        Self { runtime }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Route subsequent diagnostics to `sink`.
    pub fn set_sink(&mut self, sink: DiagnosticSender) {
        self.runtime.set_sink(sink);
    }

    /// Make a module's types and functions available to later snippets.
    pub fn reference(&mut self, module: Arc<Module>) {
        tracing::trace!(module = %module.name, "Referencing module");
        self.runtime.reference(module);
    }

    pub fn referenced_modules(&self) -> Vec<String> {
        self.runtime.module_names()
    }

    /// Evaluate a snippet.
    ///
    /// Returns the value of the final statement when it is an expression, and
    /// `None` when the snippet ends in a declaration or is empty. Bindings
    /// made before an error stay in place.
    pub fn evaluate(&mut self, source: &str) -> crate::Result<Option<Value>> {
        let source = preprocess(source, self.runtime.symbols())?;
        let program = parser::parse(&source)?;
        let result = eval::exec_program(&program, &mut self.runtime);

        if self.runtime.frame_depth() != 0 {
            return Err(Error::Internal(format!(
                "{} call frames left on the stack after evaluation",
                self.runtime.frame_depth()
            )));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::module::TypeDef;

    #[test]
    fn test_bindings_persist_across_snippets() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.evaluate("let greeting = \"hi\";").unwrap(), None);
        assert_eq!(
            interp.evaluate("greeting + \"!\"").unwrap(),
            Some(Value::String("hi!".to_string()))
        );
    }

    #[test]
    fn test_empty_snippet_has_no_value() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.evaluate("").unwrap(), None);
        assert_eq!(interp.evaluate("// just a comment").unwrap(), None);
    }

    #[test]
    fn test_partial_effects_survive_error() {
        let mut interp = Interpreter::new();
        assert!(interp.evaluate("let a = 1; let b = missing;").is_err());
        assert_eq!(interp.evaluate("a").unwrap(), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_symbols_drive_conditional_code() {
        let mut interp = Interpreter::with_settings(Settings::default().symbol("DEBUG"));
        let source = "#if DEBUG\n\"debug\"\n#else\n\"release\"\n#endif";
        assert_eq!(
            interp.evaluate(source).unwrap(),
            Some(Value::String("debug".to_string()))
        );
    }

    #[test]
    fn test_core_is_referenced() {
        let interp = Interpreter::new();
        assert_eq!(interp.referenced_modules(), vec!["core".to_string()]);
    }

    #[test]
    fn test_sink_receives_output_and_warnings() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut interp = Interpreter::with_settings(Settings::default().sink(tx));
        interp.evaluate("use core; print(\"hello\"); use core;").unwrap();

        let messages: Vec<_> = rx.try_iter().collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].severity, Severity::Info);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[1].severity, Severity::Warning);
    }

    #[test]
    fn test_host_types() {
        let mut interp = Interpreter::new();
        interp.reference(Arc::new(Module::new("widgets").with_type(
            TypeDef::view("ui", "Label").property("Text", Value::String(String::new())),
        )));
        interp.evaluate("let l = new ui.Label(); l.Text = \"hi\";").unwrap();
        let label = interp.evaluate("l").unwrap().unwrap();
        let obj = label.as_object().unwrap();
        assert_eq!(obj.get("Text"), Some(&Value::String("hi".to_string())));

        assert!(interp.evaluate("ui.Label").is_err());
    }
}
