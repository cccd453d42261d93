//! Runtime environment for the Glimpse script interpreter.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::diagnostic::{Diagnostic, DiagnosticSender};
use crate::error::Error;
use crate::module::{HostContext, Module, NativeFunction, TypeDef};
use crate::value::Value;

/// Deepest expression evaluation, counted across script calls.
pub const MAX_EXPR_NESTING: usize = 1024;

/// A name resolved through the referenced modules.
#[derive(Debug, Clone)]
pub(crate) enum Member {
    Function(NativeFunction),
    Type(TypeDef),
}

/// The state a session carries between snippets.
///
/// Session bindings live in `globals`. Each script function call pushes a
/// frame for its parameters and locals; a frame sees only itself and the
/// globals.
#[derive(Debug)]
pub struct Runtime {
    globals: HashMap<String, Value>,
    frames: Vec<HashMap<String, Value>>,
    /// Imported namespaces, in import order.
    imports: Vec<String>,
    /// Referenced modules, in reference order. Duplicates are kept.
    modules: Vec<Arc<Module>>,
    symbols: BTreeSet<String>,
    sink: Option<DiagnosticSender>,
    call_depth: usize,
    max_call_depth: usize,
    /// Expressions currently being evaluated, across calls.
    pub(crate) nesting: usize,
}

impl Runtime {
    pub(crate) fn new(
        symbols: BTreeSet<String>,
        sink: Option<DiagnosticSender>,
        max_call_depth: usize,
    ) -> Self {
        Self {
            globals: HashMap::new(),
            frames: Vec::new(),
            imports: Vec::new(),
            modules: Vec::new(),
            symbols,
            sink,
            call_depth: 0,
            max_call_depth,
            nesting: 0,
        }
    }

    pub fn symbols(&self) -> &BTreeSet<String> {
        &self.symbols
    }

    pub(crate) fn set_sink(&mut self, sink: DiagnosticSender) {
        self.sink = Some(sink);
    }

    pub(crate) fn host_context(&self) -> HostContext<'_> {
        HostContext::new(self.sink.as_ref())
    }

    /// Send a diagnostic to the sink, or stderr if no sink is configured.
    pub fn report(&self, diagnostic: Diagnostic) {
        self.host_context().report(diagnostic);
    }

    // ── Bindings ─────────────────────────────────────────────────────────────

    /// Define a variable in the current frame, or as a session global when
    /// no call is in progress.
    ///
    /// Returns `true` when an existing binding was replaced.
    pub fn define_var(&mut self, name: &str, value: Value) -> bool {
        let scope = self.frames.last_mut().unwrap_or(&mut self.globals);
        scope.insert(name.to_string(), value).is_some()
    }

    /// Get a variable from the current frame, falling back to the globals.
    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
    }

    /// Set the value of an existing variable.
    pub fn set_var(&mut self, name: &str, value: Value) -> Result<(), String> {
        if let Some(frame) = self.frames.last_mut() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        match self.globals.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(format!("Variable '{}' not defined", name)),
        }
    }

    pub fn globals(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.globals.iter()
    }

    pub(crate) fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Enter a script function call with its parameter bindings.
    pub(crate) fn enter_call(&mut self, locals: HashMap<String, Value>) -> Result<(), Error> {
        if self.call_depth >= self.max_call_depth {
            return Err(Error::runtime(format!(
                "call depth limit of {} exceeded",
                self.max_call_depth
            )));
        }
        self.call_depth += 1;
        self.frames.push(locals);
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
        self.frames.pop();
    }

    /// Enter the evaluation of one expression.
    pub(crate) fn enter_expr(&mut self) -> Result<(), Error> {
        if self.nesting >= MAX_EXPR_NESTING {
            return Err(Error::runtime(format!(
                "expression nesting limit of {} exceeded",
                MAX_EXPR_NESTING
            )));
        }
        self.nesting += 1;
        Ok(())
    }

    pub(crate) fn exit_expr(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    // ── Modules and imports ──────────────────────────────────────────────────

    /// Make a module's members resolvable.
    ///
    /// No deduplication happens here: referencing the same module twice makes
    /// every one of its members ambiguous.
    pub fn reference(&mut self, module: Arc<Module>) {
        self.modules.push(module);
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.name.clone()).collect()
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Import a namespace.
    ///
    /// Returns `false` if the namespace was already imported.
    pub fn import(&mut self, namespace: &str) -> Result<bool, Error> {
        if self.imports.iter().any(|ns| ns == namespace) {
            return Ok(false);
        }
        if !self.modules.iter().any(|m| m.provides_namespace(namespace)) {
            return Err(Error::Undefined(format!("namespace '{}'", namespace)));
        }
        self.imports.push(namespace.to_string());
        Ok(true)
    }

    pub(crate) fn has_namespace(&self, namespace: &str) -> bool {
        self.modules.iter().any(|m| m.provides_namespace(namespace))
    }

    fn candidates(&self, namespace: &str, name: &str) -> Vec<(String, Member)> {
        let mut found = Vec::new();
        for module in &self.modules {
            if let Some(def) = module.find_type(namespace, name) {
                found.push((module.name.clone(), Member::Type(def.clone())));
            }
            if let Some(func) = module.find_function(namespace, name) {
                found.push((module.name.clone(), Member::Function(func.clone())));
            }
        }
        found
    }

    fn single(display: String, mut found: Vec<(String, Member)>) -> Result<Option<Member>, Error> {
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop().map(|(_, member)| member)),
            _ => Err(Error::Ambiguous {
                name: display,
                modules: found.into_iter().map(|(module, _)| module).collect(),
            }),
        }
    }

    /// Resolve `namespace.name` exactly.
    pub(crate) fn resolve(&self, namespace: &str, name: &str) -> Result<Option<Member>, Error> {
        let display = if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", namespace, name)
        };
        Self::single(display, self.candidates(namespace, name))
    }

    /// Resolve a bare name through the root namespace and every import.
    pub(crate) fn resolve_unqualified(&self, name: &str) -> Result<Option<Member>, Error> {
        let mut found = self.candidates("", name);
        for namespace in &self.imports {
            found.extend(self.candidates(namespace, name));
        }
        Self::single(name.to_string(), found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> Runtime {
        Runtime::new(BTreeSet::new(), None, 8)
    }

    fn module(name: &str) -> Arc<Module> {
        Arc::new(Module::new(name).with_function("app", "ping", |_, _| Ok(Value::Null)))
    }

    #[test]
    fn test_define_and_get_var() {
        let mut rt = runtime();
        assert!(!rt.define_var("x", Value::Number(42.0)));
        assert_eq!(rt.get_var("x"), Some(&Value::Number(42.0)));
        assert!(rt.define_var("x", Value::Number(1.0)));
    }

    #[test]
    fn test_set_undefined_var_fails() {
        let mut rt = runtime();
        assert!(rt.set_var("x", Value::Number(1.0)).is_err());
    }

    #[test]
    fn test_call_frame_shadows_and_restores() {
        let mut rt = runtime();
        rt.define_var("x", Value::Number(1.0));
        let locals = HashMap::from([("x".to_string(), Value::Number(2.0))]);
        rt.enter_call(locals).unwrap();
        assert_eq!(rt.get_var("x"), Some(&Value::Number(2.0)));
        rt.exit_call();
        assert_eq!(rt.get_var("x"), Some(&Value::Number(1.0)));
        assert_eq!(rt.frame_depth(), 0);
    }

    #[test]
    fn test_call_depth_limit() {
        let mut rt = runtime();
        for _ in 0..8 {
            rt.enter_call(HashMap::new()).unwrap();
        }
        assert!(matches!(rt.enter_call(HashMap::new()), Err(Error::Runtime(_))));
    }

    #[test]
    fn test_expression_nesting_limit() {
        let mut rt = runtime();
        for _ in 0..MAX_EXPR_NESTING {
            rt.enter_expr().unwrap();
        }
        assert!(matches!(rt.enter_expr(), Err(Error::Runtime(_))));
        rt.exit_expr();
        assert!(rt.enter_expr().is_ok());
    }

    #[test]
    fn test_import_requires_known_namespace() {
        let mut rt = runtime();
        assert!(rt.import("app").is_err());
        rt.reference(module("app-module"));
        assert!(rt.import("app").unwrap());
        assert!(!rt.import("app").unwrap());
    }

    #[test]
    fn test_unqualified_resolution_through_import() {
        let mut rt = runtime();
        rt.reference(module("app-module"));
        assert!(rt.resolve_unqualified("ping").unwrap().is_none());
        rt.import("app").unwrap();
        assert!(matches!(
            rt.resolve_unqualified("ping").unwrap(),
            Some(Member::Function(_))
        ));
    }

    #[test]
    fn test_duplicate_reference_is_ambiguous() {
        let mut rt = runtime();
        rt.reference(module("app-module"));
        rt.reference(module("app-module"));
        match rt.resolve("app", "ping") {
            Err(Error::Ambiguous { name, modules }) => {
                assert_eq!(name, "app.ping");
                assert_eq!(modules.len(), 2);
            }
            other => panic!("Expected ambiguity, got {:?}", other),
        }
    }
}
