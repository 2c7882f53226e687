//! Resource descriptors - immutable, typed bundles of desired state
//!
//! A descriptor is a name, a requested action, and a validated attribute
//! map. Construction goes through a [`Schema`](crate::schema::Schema) so
//! invalid configurations never reach a probe or handler.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ValidationError;
use crate::schema::Schema;

/// Which handler a descriptor selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Delete,
    Tap,
    Untap,
    Enable,
    Disable,
    Attach,
    Remove,
    Register,
    Unregister,
    Install,
}

/// What end state an action drives toward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionFamily {
    /// End state is "present/valid" (create, tap, enable, attach, ...)
    Ensure,
    /// End state is "absent/disabled" (delete, untap, disable, ...)
    Revoke,
}

impl Action {
    /// Classify the action for the engine's decision table
    pub fn family(self) -> ActionFamily {
        match self {
            Self::Create
            | Self::Tap
            | Self::Enable
            | Self::Attach
            | Self::Register
            | Self::Install => ActionFamily::Ensure,
            Self::Delete | Self::Untap | Self::Disable | Self::Remove | Self::Unregister => {
                ActionFamily::Revoke
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Tap => "tap",
            Self::Untap => "untap",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Attach => "attach",
            Self::Remove => "remove",
            Self::Register => "register",
            Self::Unregister => "unregister",
            Self::Install => "install",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Human-readable type name, used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Bool(_) => "boolean",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Raw attribute map, as supplied by the caller before validation
pub type AttrMap = BTreeMap<String, AttributeValue>;

/// An immutable, validated description of desired state plus a requested
/// action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    name: String,
    action: Action,
    attributes: AttrMap,
}

impl Descriptor {
    /// Validate `attributes` against `schema` and construct a descriptor.
    ///
    /// Fails with a [`ValidationError`] naming the offending attribute and
    /// the violated constraint. Defaults declared by the schema are filled
    /// in, so accessors can rely on defaulted attributes being present.
    pub fn build(
        name: impl Into<String>,
        action: Action,
        attributes: AttrMap,
        schema: &Schema,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        schema.check_name(&name)?;
        let attributes = schema.validate(attributes)?;
        Ok(Self {
            name,
            action,
            attributes,
        })
    }

    /// The unique identifier within this resource's namespace (a file
    /// path, a tap name, a pool id, ...)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttributeValue::as_str)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.attributes.get(key).and_then(AttributeValue::as_int)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.attributes
            .get(key)
            .and_then(AttributeValue::as_bool)
            .unwrap_or(default)
    }

    pub fn list(&self, key: &str) -> &[String] {
        self.attributes
            .get(key)
            .and_then(AttributeValue::as_list)
            .unwrap_or(&[])
    }

    /// Whether the caller asked to skip the probe-based short-circuit
    pub fn force(&self) -> bool {
        self.bool_or("force", false)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.action, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_families() {
        assert_eq!(Action::Create.family(), ActionFamily::Ensure);
        assert_eq!(Action::Tap.family(), ActionFamily::Ensure);
        assert_eq!(Action::Register.family(), ActionFamily::Ensure);
        assert_eq!(Action::Delete.family(), ActionFamily::Revoke);
        assert_eq!(Action::Untap.family(), ActionFamily::Revoke);
        assert_eq!(Action::Unregister.family(), ActionFamily::Revoke);
    }

    #[test]
    fn attribute_conversions() {
        assert_eq!(AttributeValue::from("x"), AttributeValue::Str("x".into()));
        assert_eq!(AttributeValue::from(42), AttributeValue::Int(42));
        assert_eq!(AttributeValue::from(true), AttributeValue::Bool(true));
        assert_eq!(AttributeValue::from(7).as_int(), Some(7));
        assert_eq!(AttributeValue::from("x").as_int(), None);
    }

    #[test]
    fn force_defaults_to_false() {
        let d = Descriptor::build("r", Action::Create, AttrMap::new(), &Schema::new())
            .expect("empty schema accepts empty attributes");
        assert!(!d.force());
    }
}
