//! Runtime values for the Glimpse script interpreter.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::ast::FunctionDecl;
use crate::module::NativeFunction;

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The null value.
    #[default]
    Null,
    /// A boolean value.
    Boolean(bool),
    /// A numeric value (always f64).
    Number(f64),
    /// A string value.
    String(String),
    /// A list of values.
    List(Vec<Value>),
    /// An instance of a host type.
    Object(Object),
    /// A script or native function.
    Function(Function),
}

/// What a host type represents to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A visual element that has to be hosted in a page to be shown.
    View,
    /// A full screen.
    Page,
    Other,
}

/// An instance of a host type created with `new`.
///
/// Properties start out with the defaults declared by the type. Containers
/// carry a list of children, other objects carry `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub namespace: String,
    pub type_name: String,
    pub kind: ObjectKind,
    pub properties: BTreeMap<String, Value>,
    pub children: Option<Vec<Value>>,
}

impl Object {
    /// Create an empty object of the given type.
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            namespace: namespace.into(),
            type_name: type_name.into(),
            kind,
            properties: BTreeMap::new(),
            children: None,
        }
    }

    /// `namespace.Type`, or just `Type` for the root namespace.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}.{}", self.namespace, self.type_name)
        }
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    /// Set an existing property.
    ///
    /// Returns an error if the type does not declare the property.
    pub fn set(&mut self, property: &str, value: Value) -> Result<(), String> {
        match self.properties.get_mut(property) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(format!(
                "type '{}' has no property '{}'",
                self.qualified_name(),
                property
            )),
        }
    }

    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    /// Append a child to a container.
    pub fn push_child(&mut self, child: Value) -> Result<(), String> {
        match self.children.as_mut() {
            Some(children) => {
                children.push(child);
                Ok(())
            }
            None => Err(format!(
                "type '{}' cannot contain children",
                self.qualified_name()
            )),
        }
    }
}

/// A callable value.
#[derive(Clone)]
pub enum Function {
    Script(Arc<FunctionDecl>),
    Native(NativeFunction),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Script(decl) => &decl.name,
            Function::Native(native) => &native.name,
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Script(a), Function::Script(b)) => Arc::ptr_eq(a, b),
            (Function::Native(a), Function::Native(b)) => {
                a.namespace == b.namespace && a.name == b.name
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Script(decl) => write!(f, "<fn {}({})>", decl.name, decl.params.join(", ")),
            Function::Native(native) => write!(f, "<native {}.{}>", native.namespace, native.name),
        }
    }
}

impl Value {
    /// Coerce this value to a string.
    pub fn to_string_value(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::String(s) => s.clone(),
            Value::Number(n) => {
                if n.is_nan() {
                    "NaN".to_string()
                } else if n.is_infinite() {
                    let sign = if *n > 0.0 { "" } else { "-" };
                    format!("{}Infinity", sign)
                } else if *n == n.trunc() && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Value::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(|v| v.to_string_value()).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Object(obj) => format!("<{}>", obj.qualified_name()),
            Value::Function(func) => format!("{:?}", func),
        }
    }

    /// Coerce this value to a boolean.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(_) => "boolean".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::String(_) => "string".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Object(obj) => obj.qualified_name(),
            Value::Function(_) => "function".to_string(),
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Convert this value to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_json_value()).unwrap_or_else(|_| "null".to_string())
    }

    /// Convert this value to a serde_json value.
    ///
    /// Objects become `{"$type": ..., <properties>, "$children": [...]}` and
    /// functions become their printed signature.
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::List(items) => JsonValue::Array(items.iter().map(|v| v.to_json_value()).collect()),
            Value::Object(obj) => {
                let mut map = serde_json::Map::new();
                map.insert("$type".to_string(), JsonValue::String(obj.qualified_name()));
                for (key, value) in &obj.properties {
                    map.insert(key.clone(), value.to_json_value());
                }
                if let Some(children) = &obj.children {
                    map.insert(
                        "$children".to_string(),
                        JsonValue::Array(children.iter().map(|v| v.to_json_value()).collect()),
                    );
                }
                JsonValue::Object(map)
            }
            Value::Function(func) => JsonValue::String(format!("{:?}", func)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_value())
    }
}
