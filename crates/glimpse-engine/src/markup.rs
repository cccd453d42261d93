//! Markup loading: populate a constructed object from an XML description.
//!
//! ```xml
//! <StackLayout Spacing="4">
//!     <Label Text="Hello" />
//!     <Button>Press me</Button>
//! </StackLayout>
//! ```
//!
//! The root element names the target's type. Attributes set properties,
//! child elements are constructed through the evaluator and appended to the
//! parent's children, and text content sets the `Text` property.

use glimpse_script::{Object, Value};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{EvalFailure, MarkupError};
use crate::evaluator::Evaluator;

/// Property that receives an element's text content.
pub const TEXT_PROPERTY: &str = "Text";

/// Constructs objects for child elements.
pub trait InstanceFactory {
    fn create(&mut self, type_name: &str) -> Result<Object, EvalFailure>;
}

/// Applies markup to an already constructed object.
pub trait MarkupLoader: Send + Sync {
    fn load(
        &self,
        target: &mut Object,
        markup: &str,
        factory: &mut dyn InstanceFactory,
    ) -> Result<(), MarkupError>;
}

/// Construct a host type by evaluating `new <type_name>()`.
pub fn construct(evaluator: &mut dyn Evaluator, type_name: &str) -> Result<Object, EvalFailure> {
    match evaluator.evaluate(&format!("new {}()", type_name))? {
        Some(Value::Object(obj)) => Ok(obj),
        Some(other) => Err(EvalFailure::recoverable(format!(
            "'{}' produced {} instead of an object",
            type_name,
            other.type_name()
        ))),
        None => Err(EvalFailure::recoverable(format!("'{}' produced no value", type_name))),
    }
}

/// [`InstanceFactory`] that goes through the session's evaluator.
pub struct EvaluatorInstanceFactory<'a> {
    evaluator: &'a mut dyn Evaluator,
}

impl<'a> EvaluatorInstanceFactory<'a> {
    pub fn new(evaluator: &'a mut dyn Evaluator) -> Self {
        Self { evaluator }
    }
}

impl InstanceFactory for EvaluatorInstanceFactory<'_> {
    fn create(&mut self, type_name: &str) -> Result<Object, EvalFailure> {
        construct(self.evaluator, type_name)
    }
}

/// The default [`MarkupLoader`], backed by `quick-xml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlMarkupLoader;

impl MarkupLoader for XmlMarkupLoader {
    fn load(
        &self,
        target: &mut Object,
        markup: &str,
        factory: &mut dyn InstanceFactory,
    ) -> Result<(), MarkupError> {
        let mut reader = Reader::from_str(markup);
        reader.config_mut().trim_text(true);

        let namespace = target.namespace.clone();
        let mut stack: Vec<Object> = Vec::new();
        let mut done = false;

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader
                .read_event()
                .map_err(|e| MarkupError::syntax(position, e.to_string()))?;

            match event {
                Event::Start(element) | Event::Empty(element) if done => {
                    let name = element_name(&element, position)?;
                    return Err(MarkupError::syntax(
                        position,
                        format!("unexpected second root element <{}>", name),
                    ));
                }
                Event::Start(element) => {
                    let obj = open_element(&element, position, target, &namespace, &stack, factory)?;
                    stack.push(obj);
                }
                Event::Empty(element) => {
                    let obj = open_element(&element, position, target, &namespace, &stack, factory)?;
                    done = close_element(obj, &mut stack, target)?;
                }
                Event::End(_) => {
                    let obj = stack
                        .pop()
                        .ok_or_else(|| MarkupError::syntax(position, "unbalanced end tag"))?;
                    done = close_element(obj, &mut stack, target)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| MarkupError::syntax(position, e.to_string()))?;
                    set_text(&mut stack, &text, position)?;
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    set_text(&mut stack, &text, position)?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctype.
                _ => {}
            }
        }

        if done {
            Ok(())
        } else if stack.is_empty() {
            Err(MarkupError::Empty)
        } else {
            Err(MarkupError::syntax(markup.len() as u64, "unexpected end of markup"))
        }
    }
}

fn element_name(element: &BytesStart<'_>, position: u64) -> Result<String, MarkupError> {
    std::str::from_utf8(element.name().as_ref())
        .map(str::to_string)
        .map_err(|e| MarkupError::syntax(position, e.to_string()))
}

/// Build the object for an opening tag and apply its attributes.
fn open_element(
    element: &BytesStart<'_>,
    position: u64,
    target: &Object,
    namespace: &str,
    stack: &[Object],
    factory: &mut dyn InstanceFactory,
) -> Result<Object, MarkupError> {
    let name = element_name(element, position)?;

    let mut obj = match stack.last() {
        None => {
            if name != target.type_name && name != target.qualified_name() {
                return Err(MarkupError::RootMismatch {
                    expected: target.qualified_name(),
                    found: name,
                });
            }
            target.clone()
        }
        Some(parent) => {
            if !parent.is_container() {
                return Err(MarkupError::ChildrenNotAllowed {
                    parent: parent.type_name.clone(),
                });
            }
            let type_name = if name.contains('.') || namespace.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", namespace, name)
            };
            factory
                .create(&type_name)
                .map_err(|failure| MarkupError::construction(name.as_str(), failure))?
        }
    };

    for attr in element.attributes() {
        let attr = attr.map_err(|e| MarkupError::syntax(position, e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| MarkupError::syntax(position, e.to_string()))?;
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let raw = attr
            .unescape_value()
            .map_err(|e| MarkupError::syntax(position, e.to_string()))?;
        set_property(&mut obj, key, &raw)?;
    }

    Ok(obj)
}

/// Attach a finished element to its parent. Returns `true` when the root
/// closed.
fn close_element(obj: Object, stack: &mut [Object], target: &mut Object) -> Result<bool, MarkupError> {
    match stack.last_mut() {
        None => {
            *target = obj;
            Ok(true)
        }
        Some(parent) => {
            let parent_name = parent.type_name.clone();
            parent
                .push_child(Value::Object(obj))
                .map_err(|_| MarkupError::ChildrenNotAllowed { parent: parent_name })?;
            Ok(false)
        }
    }
}

fn set_text(stack: &mut [Object], text: &str, position: u64) -> Result<(), MarkupError> {
    if text.trim().is_empty() {
        return Ok(());
    }
    let Some(obj) = stack.last_mut() else {
        return Err(MarkupError::syntax(position, "text outside the root element"));
    };
    if obj.get(TEXT_PROPERTY).is_none() {
        return Err(MarkupError::TextNotAllowed {
            element: obj.type_name.clone(),
        });
    }
    set_property(obj, TEXT_PROPERTY, text)
}

/// Set `property` from its markup text, converted to the kind of the
/// property's current value.
fn set_property(obj: &mut Object, property: &str, raw: &str) -> Result<(), MarkupError> {
    let Some(current) = obj.get(property) else {
        return Err(MarkupError::UnknownProperty {
            type_name: obj.qualified_name(),
            property: property.to_string(),
        });
    };

    let bad_value = |expected: &str| MarkupError::BadValue {
        property: property.to_string(),
        value: raw.to_string(),
        expected: expected.to_string(),
    };

    let value = match current {
        Value::Number(_) => raw
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| bad_value("a number"))?,
        Value::Boolean(_) => match raw.trim() {
            "true" | "True" => Value::Boolean(true),
            "false" | "False" => Value::Boolean(false),
            _ => return Err(bad_value("true or false")),
        },
        Value::String(_) | Value::Null => Value::String(raw.to_string()),
        other => return Err(bad_value(&format!("a {} (not settable from markup)", other.type_name()))),
    };

    obj.set(property, value).map_err(|_| MarkupError::UnknownProperty {
        type_name: obj.qualified_name(),
        property: property.to_string(),
    })
}
