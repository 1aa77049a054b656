//! Component type declarations: attribute schemas and type descriptors.
//!
//! A [`ComponentType`] is an explicit descriptor value (key + schema) built
//! once at declaration time. There is no inheritance between types; a type
//! that wants another's attributes re-declares them.

use serde_json::{Map, Value};

use crate::component::{Component, ComponentKey, IntoComponent};
use crate::error::{Error, Result};

/// A single declared attribute: its name and default value.
///
/// A `Null` default means "declared, but unset until written".
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    default: Value,
}

impl Attribute {
    /// The attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared default value.
    #[must_use]
    pub fn default(&self) -> &Value {
        &self.default
    }
}

/// Ordered attribute declarations for one component type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSchema {
    attributes: Vec<Attribute>,
}

impl AttributeSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an attribute. Re-declaring an existing name replaces its
    /// default in place.
    pub fn declare(&mut self, name: impl Into<String>, default: Value) {
        let name = name.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.default = default,
            None => self.attributes.push(Attribute { name, default }),
        }
    }

    /// The declared default for `name`, if declared.
    #[must_use]
    pub fn default_of(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(Attribute::default)
    }

    /// The declared attributes, in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Number of declared attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether no attributes are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// A component type descriptor: a stable key plus the attribute schema.
///
/// Declared once, then shared by value wherever the type is needed:
///
/// ```rust
/// use serde_json::json;
/// use mosaic_ecs::ComponentType;
///
/// let position = ComponentType::declare("position")
///     .attribute("x", json!(0.0))
///     .attribute("y", json!(0.0));
/// let at_origin = position.construct(json!({})).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentType {
    key: ComponentKey,
    schema: AttributeSchema,
}

impl ComponentType {
    /// Declares a new component type. `name` is canonicalized, so
    /// `declare("Position")` and `declare("position")` describe the same
    /// type.
    #[must_use]
    pub fn declare(name: &str) -> Self {
        Self {
            key: ComponentKey::of(name),
            schema: AttributeSchema::new(),
        }
    }

    /// Declares an attribute with a default value, returning the type for
    /// chaining.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, default: Value) -> Self {
        self.schema.declare(name, default);
        self
    }

    /// The type key.
    #[must_use]
    pub fn key(&self) -> ComponentKey {
        self.key
    }

    /// The canonical type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    /// The attribute schema.
    #[must_use]
    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Whether this type declares no attributes (a pure marker).
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.schema.is_empty()
    }

    /// Builds a component instance: every declared attribute takes its value
    /// from `overrides`, else the declared default. Unknown override keys
    /// are ignored. `Null` means "no overrides".
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOverrides`] when `overrides` is neither
    /// `Null` nor a JSON object.
    pub fn construct(&self, overrides: Value) -> Result<Component> {
        let overrides = into_override_map(overrides, self.name())?;
        let mut values = Map::new();
        for attribute in self.schema.attributes() {
            let value = overrides
                .get(attribute.name())
                .cloned()
                .unwrap_or_else(|| attribute.default().clone());
            values.insert(attribute.name().to_owned(), value);
        }
        Ok(Component::from_parts(self.key, values))
    }
}

impl IntoComponent for ComponentType {
    fn into_component(self) -> Result<Component> {
        Err(Error::NotAComponent {
            type_name: self.name(),
        })
    }
}

impl IntoComponent for &ComponentType {
    fn into_component(self) -> Result<Component> {
        Err(Error::NotAComponent {
            type_name: self.name(),
        })
    }
}

/// Normalizes an override payload to a map: `Null` is empty, an object is
/// itself, anything else is a shape error attributed to `subject`.
pub(crate) fn into_override_map(
    overrides: Value,
    subject: &str,
) -> Result<Map<String, Value>> {
    match overrides {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidOverrides {
            component: subject.to_owned(),
            message: format!("expected a JSON object, got {}", value_kind(&other)),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
