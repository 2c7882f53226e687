//! Attribute schemas - declared types, constraints, and defaults
//!
//! A schema is a static mapping from attribute name to a constraint
//! descriptor, validated by one generic routine. Enumerated sets are
//! closed lists; values outside the set are rejected at construction,
//! not at execution.

use regex::Regex;
use std::collections::BTreeMap;

use crate::descriptor::{AttrMap, AttributeValue};
use crate::error::ValidationError;

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Str,
    Int,
    Bool,
    List,
}

impl AttributeKind {
    fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "integer",
            Self::Bool => "boolean",
            Self::List => "list",
        }
    }

    fn matches(self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (Self::Str, AttributeValue::Str(_))
                | (Self::Int, AttributeValue::Int(_))
                | (Self::Bool, AttributeValue::Bool(_))
                | (Self::List, AttributeValue::List(_))
        )
    }
}

/// Constraint on a single attribute
#[derive(Debug, Clone)]
pub struct Constraint {
    kind: AttributeKind,
    required: bool,
    default: Option<AttributeValue>,
    allowed: Option<Vec<AttributeValue>>,
    pattern: Option<Regex>,
}

impl Constraint {
    fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            allowed: None,
            pattern: None,
        }
    }

    pub fn string() -> Self {
        Self::new(AttributeKind::Str)
    }

    pub fn integer() -> Self {
        Self::new(AttributeKind::Int)
    }

    pub fn boolean() -> Self {
        Self::new(AttributeKind::Bool)
    }

    pub fn list() -> Self {
        Self::new(AttributeKind::List)
    }

    /// Mark the attribute as required; omitting it fails validation
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Default value filled in when the attribute is omitted
    pub fn default(mut self, value: impl Into<AttributeValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Restrict the attribute to a closed set of values
    pub fn one_of<V: Into<AttributeValue>>(
        mut self,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Require string values to match a regex.
    ///
    /// Patterns are developer-authored literals; an invalid pattern is a
    /// programming error.
    pub fn matches(mut self, pattern: &str) -> Self {
        self.pattern = Some(Regex::new(pattern).expect("invalid constraint pattern"));
        self
    }

    fn check(&self, name: &str, value: &AttributeValue) -> Result<(), ValidationError> {
        if !self.kind.matches(value) {
            return Err(ValidationError::new(
                name,
                format!("expected {}, got {}", self.kind.name(), value.type_name()),
            ));
        }

        if let Some(allowed) = &self.allowed
            && !allowed.contains(value)
        {
            let choices: Vec<String> = allowed.iter().map(ToString::to_string).collect();
            return Err(ValidationError::new(
                name,
                format!("`{value}` is not one of [{}]", choices.join(", ")),
            ));
        }

        if let Some(pattern) = &self.pattern
            && let Some(s) = value.as_str()
            && !pattern.is_match(s)
        {
            return Err(ValidationError::new(
                name,
                format!("`{s}` does not match `{pattern}`"),
            ));
        }

        Ok(())
    }
}

/// Static schema for one resource domain
#[derive(Debug, Clone, Default)]
pub struct Schema {
    constraints: BTreeMap<String, Constraint>,
    name_pattern: Option<Regex>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute
    pub fn attr(mut self, name: &str, constraint: Constraint) -> Self {
        self.constraints.insert(name.to_string(), constraint);
        self
    }

    /// Require descriptor names to match a regex
    pub fn name_pattern(mut self, pattern: &str) -> Self {
        self.name_pattern = Some(Regex::new(pattern).expect("invalid name pattern"));
        self
    }

    pub(crate) fn check_name(&self, name: &str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::new("name", "name cannot be empty"));
        }
        if let Some(pattern) = &self.name_pattern
            && !pattern.is_match(name)
        {
            return Err(ValidationError::new(
                "name",
                format!("`{name}` does not match `{pattern}`"),
            ));
        }
        Ok(())
    }

    /// Validate an attribute map: reject unknown attributes, check each
    /// declared constraint, fill in defaults, and enforce required fields.
    pub fn validate(&self, mut attributes: AttrMap) -> Result<AttrMap, ValidationError> {
        for (name, value) in &attributes {
            let Some(constraint) = self.constraints.get(name) else {
                return Err(ValidationError::new(name, "unknown attribute"));
            };
            constraint.check(name, value)?;
        }

        for (name, constraint) in &self.constraints {
            if attributes.contains_key(name) {
                continue;
            }
            if let Some(default) = &constraint.default {
                attributes.insert(name.clone(), default.clone());
            } else if constraint.required {
                return Err(ValidationError::new(name, "required attribute is missing"));
            }
        }

        Ok(attributes)
    }
}
