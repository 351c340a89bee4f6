//! Schema model
//!
//! A [`SchemaNode`] describes the shape and constraints of one value. Nodes are
//! built once (by the loader or the builder helpers below) and then shared
//! read-only behind [`Arc`] for the lifetime of the process.
//!
//! Constraint fields live inside the [`SchemaKind`] variant they belong to, so
//! a field that is meaningless for a kind cannot be set on it in the first
//! place.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SchemaError};
use crate::value::{normalize_number, ValueKind};

/// Prefix of a local component reference
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

// =============================================================================
// Pattern
// =============================================================================

/// A pre-compiled regular expression.
///
/// Compiled when the schema is built so a bad pattern is a setup error rather
/// than something discovered while validating traffic.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self> {
        Regex::new(source)
            .map(Pattern)
            .map_err(|source_err| SchemaError::InvalidPattern {
                pattern: source.to_string(),
                source: source_err,
            })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Unanchored search, as JSON Schema defines `pattern`
    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Kind-specific rules
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    /// Hint for example generation ("email", "uuid", "date-time"); never enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Inclusive numeric bounds, shared by integer and number schemas.
///
/// Kept as JSON numbers so integer bounds beyond 2^53 stay exact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayRules {
    /// Schema every element must satisfy; `None` leaves elements unchecked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Arc<SchemaNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectRules {
    /// Declared properties in declaration order (drives error order)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<(String, Arc<SchemaNode>)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ObjectRules {
    /// Look up a declared property by name
    pub fn property(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.properties
            .iter()
            .find(|(prop, _)| prop == name)
            .map(|(_, schema)| schema)
    }
}

/// The closed set of schema kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SchemaKind {
    Null,
    Boolean,
    Integer(NumericBounds),
    Number(NumericBounds),
    String(StringRules),
    Array(ArrayRules),
    Object(ObjectRules),
}

impl SchemaKind {
    /// The runtime kind a conforming value must have
    pub fn value_kind(&self) -> ValueKind {
        match self {
            SchemaKind::Null => ValueKind::Null,
            SchemaKind::Boolean => ValueKind::Boolean,
            SchemaKind::Integer(_) => ValueKind::Integer,
            SchemaKind::Number(_) => ValueKind::Number,
            SchemaKind::String(_) => ValueKind::String,
            SchemaKind::Array(_) => ValueKind::Array,
            SchemaKind::Object(_) => ValueKind::Object,
        }
    }
}

// =============================================================================
// SchemaNode
// =============================================================================

/// A single node in a schema graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    #[serde(flatten)]
    pub kind: SchemaKind,
    /// Allowed literal values
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    /// Single allowed literal value
    #[serde(rename = "const", default, skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            enum_values: None,
            const_value: None,
            title: None,
        }
    }

    pub fn null() -> Self {
        Self::new(SchemaKind::Null)
    }

    pub fn boolean() -> Self {
        Self::new(SchemaKind::Boolean)
    }

    pub fn integer() -> Self {
        Self::new(SchemaKind::Integer(NumericBounds::default()))
    }

    pub fn number() -> Self {
        Self::new(SchemaKind::Number(NumericBounds::default()))
    }

    pub fn string() -> Self {
        Self::new(SchemaKind::String(StringRules::default()))
    }

    /// Array whose elements must all satisfy `items`
    pub fn array(items: SchemaNode) -> Self {
        Self::new(SchemaKind::Array(ArrayRules {
            items: Some(Arc::new(items)),
            ..ArrayRules::default()
        }))
    }

    /// Array with unchecked elements
    pub fn any_array() -> Self {
        Self::new(SchemaKind::Array(ArrayRules::default()))
    }

    pub fn object() -> Self {
        Self::new(SchemaKind::Object(ObjectRules::default()))
    }

    /// The runtime kind a conforming value must have
    pub fn value_kind(&self) -> ValueKind {
        self.kind.value_kind()
    }

    // --- Builder helpers. Each is a no-op on a kind it does not apply to. ---

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn one_of_values(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn constant(mut self, value: Value) -> Self {
        self.const_value = Some(value);
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        if let SchemaKind::String(rules) = &mut self.kind {
            rules.min_length = Some(n);
        }
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        if let SchemaKind::String(rules) = &mut self.kind {
            rules.max_length = Some(n);
        }
        self
    }

    /// Attach a regular expression; fails if it does not compile
    pub fn pattern(mut self, source: &str) -> Result<Self> {
        if let SchemaKind::String(rules) = &mut self.kind {
            rules.pattern = Some(Pattern::new(source)?);
        }
        Ok(self)
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        if let SchemaKind::String(rules) = &mut self.kind {
            rules.format = Some(format.into());
        }
        self
    }

    /// Inclusive lower bound; a non-finite bound is ignored
    pub fn minimum(self, bound: f64) -> Self {
        match Number::from_f64(bound) {
            Some(bound) => self.exact_minimum(bound),
            None => self,
        }
    }

    /// Inclusive upper bound; a non-finite bound is ignored
    pub fn maximum(self, bound: f64) -> Self {
        match Number::from_f64(bound) {
            Some(bound) => self.exact_maximum(bound),
            None => self,
        }
    }

    /// Inclusive lower bound without a round trip through `f64`
    pub fn exact_minimum(mut self, bound: impl Into<Number>) -> Self {
        if let SchemaKind::Integer(b) | SchemaKind::Number(b) = &mut self.kind {
            b.minimum = Some(normalize_number(bound.into()));
        }
        self
    }

    /// Inclusive upper bound without a round trip through `f64`
    pub fn exact_maximum(mut self, bound: impl Into<Number>) -> Self {
        if let SchemaKind::Integer(b) | SchemaKind::Number(b) = &mut self.kind {
            b.maximum = Some(normalize_number(bound.into()));
        }
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        if let SchemaKind::Array(rules) = &mut self.kind {
            rules.min_items = Some(n);
        }
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        if let SchemaKind::Array(rules) = &mut self.kind {
            rules.max_items = Some(n);
        }
        self
    }

    /// Append a property; declaration order is preserved
    pub fn property(mut self, name: impl Into<String>, schema: SchemaNode) -> Self {
        if let SchemaKind::Object(rules) = &mut self.kind {
            rules.properties.push((name.into(), Arc::new(schema)));
        }
        self
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        if let SchemaKind::Object(rules) = &mut self.kind {
            rules.required.push(name.into());
        }
        self
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Where a message finds its payload schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadRef {
    /// A component schema, by name
    Named(String),
    /// A schema declared directly on the message
    Inline(Arc<SchemaNode>),
}

impl PayloadRef {
    /// Parse a bare schema name or a `#/components/schemas/<name>` reference
    pub fn parse(reference: &str) -> Self {
        let name = reference
            .strip_prefix(COMPONENTS_PREFIX)
            .unwrap_or(reference);
        PayloadRef::Named(name.to_string())
    }
}

impl fmt::Display for PayloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadRef::Named(name) => write!(f, "{}{}", COMPONENTS_PREFIX, name),
            PayloadRef::Inline(_) => f.write_str("<inline>"),
        }
    }
}

/// A named message and the schema its payload must satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub name: String,
    pub payload: PayloadRef,
}

impl Message {
    pub fn new(name: impl Into<String>, reference: &str) -> Self {
        Self {
            name: name.into(),
            payload: PayloadRef::parse(reference),
        }
    }

    pub fn inline(name: impl Into<String>, schema: SchemaNode) -> Self {
        Self {
            name: name.into(),
            payload: PayloadRef::Inline(Arc::new(schema)),
        }
    }
}
