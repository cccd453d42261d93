//! Host modules: units of native functions and object types that a host
//! makes visible to the interpreter by referencing them.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::diagnostic::{Diagnostic, DiagnosticSender};
use crate::value::{Object, ObjectKind, Value};

/// What a native function can reach while it runs.
pub struct HostContext<'a> {
    sink: Option<&'a DiagnosticSender>,
}

impl<'a> HostContext<'a> {
    pub(crate) fn new(sink: Option<&'a DiagnosticSender>) -> Self {
        Self { sink }
    }

    /// Report a message to the session's diagnostic sink, or stderr if none
    /// is attached.
    pub fn report(&self, diagnostic: Diagnostic) {
        match self.sink {
            // A disconnected sink means nobody is collecting messages anymore.
            Some(sink) => {
                let _ = sink.send(diagnostic);
            }
            None => eprintln!("{}", diagnostic),
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.report(Diagnostic::info(text));
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.report(Diagnostic::warning(text));
    }
}

type NativeFn = dyn Fn(&HostContext<'_>, &[Value]) -> Result<Value, String> + Send + Sync;

/// A function implemented by the host.
///
/// Returning `Err` is an ordinary script error. Panicking is treated as an
/// internal failure of the interpreter.
#[derive(Clone)]
pub struct NativeFunction {
    pub namespace: String,
    pub name: String,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(namespace: impl Into<String>, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&HostContext<'_>, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn call(&self, ctx: &HostContext<'_>, args: &[Value]) -> Result<Value, String> {
        (self.func)(ctx, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({}.{})", self.namespace, self.name)
    }
}

/// A host type that scripts can construct with `new`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub namespace: String,
    pub name: String,
    pub kind: ObjectKind,
    /// Declared properties with their default values, in declaration order.
    pub properties: Vec<(String, Value)>,
    pub container: bool,
}

impl TypeDef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind: ObjectKind::Other,
            properties: Vec::new(),
            container: false,
        }
    }

    pub fn view(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name).kind(ObjectKind::View)
    }

    pub fn page(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name).kind(ObjectKind::Page)
    }

    pub fn kind(mut self, kind: ObjectKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn property(mut self, name: impl Into<String>, default: Value) -> Self {
        self.properties.push((name.into(), default));
        self
    }

    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }

    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Build a fresh instance with every property at its default.
    pub fn instantiate(&self) -> Object {
        let mut obj = Object::new(self.namespace.clone(), self.name.clone(), self.kind);
        obj.properties = self.properties.iter().cloned().collect();
        if self.container {
            obj.children = Some(Vec::new());
        }
        obj
    }
}

/// A dynamically loadable unit of host code, identified by its name.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub types: Vec<TypeDef>,
    pub functions: Vec<NativeFunction>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn with_type(mut self, def: TypeDef) -> Self {
        self.types.push(def);
        self
    }

    pub fn with_function<F>(mut self, namespace: &str, name: &str, func: F) -> Self
    where
        F: Fn(&HostContext<'_>, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.push(NativeFunction::new(namespace, name, func));
        self
    }

    /// Every namespace this module contributes members to.
    pub fn namespaces(&self) -> BTreeSet<&str> {
        self.types
            .iter()
            .map(|t| t.namespace.as_str())
            .chain(self.functions.iter().map(|f| f.namespace.as_str()))
            .collect()
    }

    pub fn provides_namespace(&self, namespace: &str) -> bool {
        self.types.iter().any(|t| t.namespace == namespace)
            || self.functions.iter().any(|f| f.namespace == namespace)
    }

    pub(crate) fn find_type(&self, namespace: &str, name: &str) -> Option<&TypeDef> {
        self.types
            .iter()
            .find(|t| t.namespace == namespace && t.name == name)
    }

    pub(crate) fn find_function(&self, namespace: &str, name: &str) -> Option<&NativeFunction> {
        self.functions
            .iter()
            .find(|f| f.namespace == namespace && f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instantiate_uses_defaults() {
        let def = TypeDef::view("ui", "Label")
            .property("Text", Value::String("?".to_string()))
            .property("Size", Value::Number(12.0));
        let obj = def.instantiate();
        assert_eq!(obj.qualified_name(), "ui.Label");
        assert_eq!(obj.kind, ObjectKind::View);
        assert_eq!(obj.get("Size"), Some(&Value::Number(12.0)));
        assert!(!obj.is_container());
    }

    #[test]
    fn test_container_starts_empty() {
        let obj = TypeDef::view("ui", "Stack").container().instantiate();
        assert_eq!(obj.children, Some(Vec::new()));
    }

    #[test]
    fn test_namespaces() {
        let module = Module::new("widgets")
            .with_type(TypeDef::view("ui", "Label"))
            .with_function("ui.util", "noop", |_, _| Ok(Value::Null));
        let namespaces: Vec<&str> = module.namespaces().into_iter().collect();
        assert_eq!(namespaces, vec!["ui", "ui.util"]);
        assert!(module.provides_namespace("ui.util"));
        assert!(!module.provides_namespace("ui.other"));
    }
}
