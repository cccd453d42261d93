//! The seam between the engine and the language that evaluates snippets.
//!
//! The engine only ever talks to `dyn Evaluator`. The default implementation
//! adapts `glimpse_script::Interpreter`; tests plug in fakes.

use std::collections::BTreeSet;
use std::sync::Arc;

use glimpse_script::{DiagnosticSender, Interpreter, Module, Settings, Value, DEFAULT_MAX_CALL_DEPTH};

use crate::error::EvalFailure;

/// What a freshly built evaluator is configured with.
#[derive(Debug, Clone)]
pub struct EvaluatorSettings {
    /// Conditional symbols for `#if`.
    pub symbols: BTreeSet<String>,
    /// Where the evaluator reports printed output and warnings.
    pub sink: DiagnosticSender,
}

/// A persistent evaluation session.
pub trait Evaluator: Send {
    /// Evaluate a snippet. `Ok(None)` means the snippet produced no value.
    fn evaluate(&mut self, code: &str) -> Result<Option<Value>, EvalFailure>;

    /// Make a module's members available. Callers deduplicate.
    fn reference(&mut self, module: Arc<Module>);

    fn referenced_modules(&self) -> Vec<String>;
}

/// Builds evaluators for new sessions.
pub trait EvaluatorFactory: Send + Sync {
    fn create(&self, settings: EvaluatorSettings) -> Result<Box<dyn Evaluator>, EvalFailure>;
}

/// Classify an interpreter error at the seam.
pub fn classify(err: glimpse_script::Error) -> EvalFailure {
    let failure = if err.is_internal() {
        EvalFailure::fatal(err.to_string())
    } else {
        EvalFailure::recoverable(err.to_string())
    };
    failure.with_detail(format!("{:?}", err))
}

/// [`Evaluator`] backed by a glimpse-script interpreter.
#[derive(Debug)]
pub struct ScriptEvaluator {
    interpreter: Interpreter,
}

impl ScriptEvaluator {
    pub fn new(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }
}

impl Evaluator for ScriptEvaluator {
    fn evaluate(&mut self, code: &str) -> Result<Option<Value>, EvalFailure> {
        self.interpreter.evaluate(code).map_err(classify)
    }

    fn reference(&mut self, module: Arc<Module>) {
        self.interpreter.reference(module);
    }

    fn referenced_modules(&self) -> Vec<String> {
        self.interpreter.referenced_modules()
    }
}

/// The default factory.
#[derive(Debug, Clone)]
pub struct ScriptEvaluatorFactory {
    max_call_depth: usize,
}

impl Default for ScriptEvaluatorFactory {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl ScriptEvaluatorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

impl EvaluatorFactory for ScriptEvaluatorFactory {
    fn create(&self, settings: EvaluatorSettings) -> Result<Box<dyn Evaluator>, EvalFailure> {
        let interpreter = Interpreter::with_settings(Settings {
            symbols: settings.symbols,
            sink: Some(settings.sink),
            max_call_depth: self.max_call_depth,
        });
        Ok(Box::new(ScriptEvaluator::new(interpreter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    fn evaluator() -> Box<dyn Evaluator> {
        let (tx, _rx) = std::sync::mpsc::channel();
        ScriptEvaluatorFactory::new()
            .create(EvaluatorSettings {
                symbols: BTreeSet::new(),
                sink: tx,
            })
            .unwrap()
    }

    #[test]
    fn test_user_errors_are_recoverable() {
        let mut eval = evaluator();
        let failure = eval.evaluate("missing_name").unwrap_err();
        assert_eq!(failure.kind, FailureKind::Recoverable);
        assert!(failure.message.contains("missing_name"));
        assert!(failure.detail.is_some());
    }

    #[test]
    fn test_native_panic_is_fatal() {
        let mut eval = evaluator();
        eval.reference(Arc::new(
            Module::new("broken").with_function("broken", "crash", |_, _| panic!("corrupted")),
        ));
        let failure = eval.evaluate("broken.crash()").unwrap_err();
        assert!(failure.is_fatal());
    }

    #[test]
    fn test_reference_is_visible() {
        let mut eval = evaluator();
        eval.reference(Arc::new(Module::new("extra")));
        assert_eq!(eval.referenced_modules(), vec!["core", "extra"]);
    }
}
