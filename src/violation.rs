//! Validation errors and the accumulator that collects them
//!
//! A [`ValidationError`] is data: it says which rule was broken, where, and by
//! what value. Its serialized field names (`path`, `message`, `value`,
//! `constraint`) and the [`Constraint`] member names form the wire contract
//! callers depend on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Outcome of validating one payload
pub type ValidationOutcome = std::result::Result<(), Vec<ValidationError>>;

/// One step in a path: an object key or an array index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Render a path as `$.orders[2].sku`; the root is `$`
pub fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::from("$");
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                out.push('.');
                out.push_str(key);
            }
            PathSegment::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// The rule a value violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constraint {
    TypeMismatch,
    Required,
    MinLength,
    MaxLength,
    Pattern,
    Enum,
    Minimum,
    Maximum,
    MinItems,
    MaxItems,
    NotFound,
    NoSchema,
    Internal,
}

impl Constraint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Constraint::TypeMismatch => "TypeMismatch",
            Constraint::Required => "Required",
            Constraint::MinLength => "MinLength",
            Constraint::MaxLength => "MaxLength",
            Constraint::Pattern => "Pattern",
            Constraint::Enum => "Enum",
            Constraint::Minimum => "Minimum",
            Constraint::Maximum => "Maximum",
            Constraint::MinItems => "MinItems",
            Constraint::MaxItems => "MaxItems",
            Constraint::NotFound => "NotFound",
            Constraint::NoSchema => "NoSchema",
            Constraint::Internal => "Internal",
        }
    }

    /// Resolution failures describe configuration, not the payload
    pub fn is_resolution(&self) -> bool {
        matches!(self, Constraint::NotFound | Constraint::NoSchema)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single path-addressed violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: Vec<PathSegment>,
    pub message: String,
    /// The offending value, echoed for diagnostics
    pub value: Value,
    pub constraint: Constraint,
}

impl ValidationError {
    pub fn new(
        path: Vec<PathSegment>,
        constraint: Constraint,
        message: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            path,
            message: message.into(),
            value,
            constraint,
        }
    }

    /// No message with this name is known
    pub fn not_found(message_name: &str, suggestion: Option<&str>) -> Self {
        let message = match suggestion {
            Some(close) => format!("Unknown message '{}' (did you mean '{}'?)", message_name, close),
            None => format!("Unknown message '{}'", message_name),
        };
        Self::new(
            Vec::new(),
            Constraint::NotFound,
            message,
            Value::String(message_name.to_string()),
        )
    }

    /// The message is known but its payload reference does not resolve
    pub fn no_schema(message_name: &str, reference: &str) -> Self {
        Self::new(
            Vec::new(),
            Constraint::NoSchema,
            format!(
                "Message '{}' references '{}', which is not a known schema",
                message_name, reference
            ),
            Value::String(reference.to_string()),
        )
    }

    /// A fault inside the validation machinery itself
    pub fn internal(path: Vec<PathSegment>, detail: impl Into<String>) -> Self {
        Self::new(path, Constraint::Internal, detail, Value::Null)
    }

    /// Path rendered as `$.a[0].b`
    pub fn path_string(&self) -> String {
        display_path(&self.path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.constraint, self.path_string(), self.message)
    }
}

impl std::error::Error for ValidationError {}

// =============================================================================
// Accumulator
// =============================================================================

/// Ordered collection of violations produced during one validation pass.
///
/// Also tracks the current path so recursive checks can push and pop segments
/// instead of allocating a fresh path per level.
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    path: Vec<PathSegment>,
    errors: Vec<ValidationError>,
}

impl ErrorAccumulator {
    /// Start at `base` (the root is an empty path)
    pub fn at(base: Vec<PathSegment>) -> Self {
        Self {
            path: base,
            errors: Vec::new(),
        }
    }

    pub fn enter(&mut self, segment: impl Into<PathSegment>) {
        self.path.push(segment.into());
    }

    pub fn leave(&mut self) {
        self.path.pop();
    }

    /// Record a violation at the current path
    pub fn push(&mut self, constraint: Constraint, message: impl Into<String>, value: &Value) {
        self.errors.push(ValidationError::new(
            self.path.clone(),
            constraint,
            message,
            value.clone(),
        ));
    }

    /// Record a violation one segment below the current path
    pub fn push_child(
        &mut self,
        segment: impl Into<PathSegment>,
        constraint: Constraint,
        message: impl Into<String>,
        value: &Value,
    ) {
        self.enter(segment);
        self.push(constraint, message, value);
        self.leave();
    }

    pub fn into_outcome(self) -> ValidationOutcome {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_path() {
        let path = vec![
            PathSegment::from("orders"),
            PathSegment::from(2usize),
            PathSegment::from("sku"),
        ];
        assert_eq!(display_path(&path), "$.orders[2].sku");
        assert_eq!(display_path(&[]), "$");
    }

    #[test]
    fn test_wire_shape() {
        let err = ValidationError::new(
            vec!["items".into(), 0usize.into()],
            Constraint::Minimum,
            "too small",
            json!(-1),
        );
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "path": ["items", 0],
                "message": "too small",
                "value": -1,
                "constraint": "Minimum"
            })
        );
    }

    #[test]
    fn test_accumulator_tracks_path() {
        let mut acc = ErrorAccumulator::default();
        acc.enter("user");
        acc.push_child("email", Constraint::Required, "missing", &Value::Null);
        acc.leave();
        acc.push(Constraint::TypeMismatch, "bad", &json!(1));

        let errors = acc.into_outcome().unwrap_err();
        assert_eq!(errors[0].path, vec![PathSegment::from("user"), PathSegment::from("email")]);
        assert!(errors[1].path.is_empty());
    }

    #[test]
    fn test_empty_accumulator_is_ok() {
        assert_eq!(ErrorAccumulator::default().into_outcome(), Ok(()));
    }

    #[test]
    fn test_not_found_mentions_suggestion() {
        let err = ValidationError::not_found("user.craeted", Some("user.created"));
        assert_eq!(err.constraint, Constraint::NotFound);
        assert!(err.message.contains("did you mean 'user.created'"));
        assert!(err.constraint.is_resolution());
    }
}
