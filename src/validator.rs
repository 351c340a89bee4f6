//! Type Validator
//!
//! Decides whether a payload conforms to a [`SchemaNode`] and, when it does
//! not, reports every violation with its path.
//!
//! Each node is checked in four phases whose errors are appended in this
//! order:
//!
//! 1. **Type** - the runtime kind must match the schema kind. A mismatch is
//!    reported once and does not stop the later phases.
//! 2. **Required** - object schemas only, and only when the value really is an
//!    object. Each missing name is reported at `path + [name]`.
//! 3. **Properties** - object schemas on object values. Present properties are
//!    validated recursively in declaration order; absent ones are skipped.
//! 4. **Constraints** - only when the kinds agree. Strings check
//!    `min_length`, `max_length`, `pattern`, `enum`, `const`; numbers check
//!    `minimum`, `maximum`, `enum`, `const`; arrays check `min_items`,
//!    `max_items` and then every element against `items`.
//!
//! Validation never mutates its inputs and never panics on a malformed
//! payload. A fault inside the machinery (including a schema nested deeper
//! than [`ValidationOptions::max_depth`]) becomes a single
//! [`Constraint::Internal`] error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

use crate::schema::{ArrayRules, NumericBounds, SchemaKind, SchemaNode, StringRules};
use crate::value::{self, ValueKind};
use crate::violation::{Constraint, ErrorAccumulator, PathSegment, ValidationError, ValidationOutcome};

/// Default nesting limit for a single validation pass
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Tunables for a validation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Deepest schema nesting followed before giving up with `Internal`
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Validate `value` against `schema` from the root
pub fn validate(value: &Value, schema: &SchemaNode) -> ValidationOutcome {
    validate_with(value, schema, &[], &ValidationOptions::default())
}

/// Validate `value` against `schema`, reporting paths below `path`
pub fn validate_at(value: &Value, schema: &SchemaNode, path: &[PathSegment]) -> ValidationOutcome {
    validate_with(value, schema, path, &ValidationOptions::default())
}

/// Validate with explicit options.
///
/// This is the boundary where internal faults are caught: whatever happens
/// inside, the caller gets a [`ValidationOutcome`].
pub fn validate_with(
    value: &Value,
    schema: &SchemaNode,
    path: &[PathSegment],
    options: &ValidationOptions,
) -> ValidationOutcome {
    fault_boundary(path, || {
        let mut acc = ErrorAccumulator::at(path.to_vec());
        check_node(value, schema, &mut acc, options, 0);
        acc.into_outcome()
    })
}

/// Run `check`, turning a panic into one `Internal` error at `path`
fn fault_boundary<F>(path: &[PathSegment], check: F) -> ValidationOutcome
where
    F: FnOnce() -> ValidationOutcome,
{
    match panic::catch_unwind(AssertUnwindSafe(check)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = panic_detail(payload.as_ref());
            warn!(path = %crate::violation::display_path(path), %detail, "validator fault");
            Err(vec![ValidationError::internal(
                path.to_vec(),
                format!("Internal validator fault: {}", detail),
            )])
        }
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Phases
// =============================================================================

fn check_node(
    value: &Value,
    schema: &SchemaNode,
    acc: &mut ErrorAccumulator,
    options: &ValidationOptions,
    depth: usize,
) {
    if depth > options.max_depth {
        acc.push(
            Constraint::Internal,
            format!("Schema nesting exceeds maximum depth of {}", options.max_depth),
            value,
        );
        return;
    }

    let expected = schema.value_kind();
    let actual = ValueKind::of(value);
    let kinds_agree = expected.accepts(actual);

    // Type
    if !kinds_agree {
        acc.push(
            Constraint::TypeMismatch,
            format!("Expected {}, got {}", expected, actual),
            value,
        );
    }

    if let (SchemaKind::Object(rules), Value::Object(map)) = (&schema.kind, value) {
        // Required
        for name in &rules.required {
            if !map.contains_key(name) {
                acc.push_child(
                    name.as_str(),
                    Constraint::Required,
                    format!("Missing required property '{}'", name),
                    value,
                );
            }
        }

        // Properties
        for (name, subschema) in &rules.properties {
            if let Some(child) = map.get(name) {
                acc.enter(name.as_str());
                check_node(child, subschema, acc, options, depth + 1);
                acc.leave();
            }
        }
    }

    // Constraints
    if !kinds_agree {
        return;
    }
    match &schema.kind {
        SchemaKind::String(rules) => {
            check_string(value, rules, acc);
            check_literals(value, schema, acc);
        }
        SchemaKind::Integer(bounds) | SchemaKind::Number(bounds) => {
            check_bounds(value, bounds, acc);
            check_literals(value, schema, acc);
        }
        SchemaKind::Array(rules) => check_array(value, rules, acc, options, depth),
        SchemaKind::Object(_) | SchemaKind::Boolean | SchemaKind::Null => {}
    }
}

fn check_string(value: &Value, rules: &StringRules, acc: &mut ErrorAccumulator) {
    let Some(s) = value.as_str() else {
        return;
    };
    let length = value::char_length(s);

    if let Some(min) = rules.min_length {
        if length < min {
            acc.push(
                Constraint::MinLength,
                format!("String length {} is below minimum length {}", length, min),
                value,
            );
        }
    }
    if let Some(max) = rules.max_length {
        if length > max {
            acc.push(
                Constraint::MaxLength,
                format!("String length {} exceeds maximum length {}", length, max),
                value,
            );
        }
    }
    if let Some(pattern) = &rules.pattern {
        if !pattern.is_match(s) {
            acc.push(
                Constraint::Pattern,
                format!("String does not match pattern '{}'", pattern.as_str()),
                value,
            );
        }
    }
}

fn check_bounds(value: &Value, bounds: &NumericBounds, acc: &mut ErrorAccumulator) {
    let Some(n) = value.as_number() else {
        return;
    };

    if let Some(min) = &bounds.minimum {
        if value::compare_numbers(n, min) == Some(Ordering::Less) {
            acc.push(
                Constraint::Minimum,
                format!("Value {} is below minimum {}", value, min),
                value,
            );
        }
    }
    if let Some(max) = &bounds.maximum {
        if value::compare_numbers(n, max) == Some(Ordering::Greater) {
            acc.push(
                Constraint::Maximum,
                format!("Value {} exceeds maximum {}", value, max),
                value,
            );
        }
    }
}

/// `enum` and `const`, both reported as [`Constraint::Enum`]
fn check_literals(value: &Value, schema: &SchemaNode, acc: &mut ErrorAccumulator) {
    if let Some(allowed) = &schema.enum_values {
        if !allowed.iter().any(|candidate| literal_eq(candidate, value)) {
            acc.push(
                Constraint::Enum,
                format!("Value {} is not one of {}", value, Value::Array(allowed.clone())),
                value,
            );
        }
    }
    if let Some(expected) = &schema.const_value {
        if !literal_eq(expected, value) {
            acc.push(
                Constraint::Enum,
                format!("Value {} does not equal constant {}", value, expected),
                value,
            );
        }
    }
}

fn check_array(
    value: &Value,
    rules: &ArrayRules,
    acc: &mut ErrorAccumulator,
    options: &ValidationOptions,
    depth: usize,
) {
    let Some(elements) = value.as_array() else {
        return;
    };

    if let Some(min) = rules.min_items {
        if elements.len() < min {
            acc.push(
                Constraint::MinItems,
                format!("Array has {} items, fewer than minimum {}", elements.len(), min),
                value,
            );
        }
    }
    if let Some(max) = rules.max_items {
        if elements.len() > max {
            acc.push(
                Constraint::MaxItems,
                format!("Array has {} items, more than maximum {}", elements.len(), max),
                value,
            );
        }
    }

    if let Some(items) = &rules.items {
        for (index, element) in elements.iter().enumerate() {
            acc.enter(index);
            check_node(element, items, acc, options, depth + 1);
            acc.leave();
        }
    }
}

/// Literal equality with `1` and `1.0` considered equal
pub(crate) fn literal_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            value::compare_numbers(x, y) == Some(Ordering::Equal)
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_schema;
    use serde_json::json;

    fn constraints(outcome: ValidationOutcome) -> Vec<Constraint> {
        outcome
            .unwrap_err()
            .into_iter()
            .map(|e| e.constraint)
            .collect()
    }

    #[test]
    fn test_required_missing_on_empty_object() {
        let schema = SchemaNode::object()
            .required("name")
            .property("name", SchemaNode::string());
        let errors = validate(&json!({}), &schema).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, Constraint::Required);
        assert_eq!(errors[0].path, vec![PathSegment::from("name")]);
    }

    #[test]
    fn test_min_length_at_root() {
        let schema = SchemaNode::string().min_length(3);
        let errors = validate(&json!("ab"), &schema).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, Constraint::MinLength);
        assert!(errors[0].path.is_empty());
    }

    #[test]
    fn test_max_items_reported_at_root() {
        let schema = SchemaNode::array(SchemaNode::integer()).max_items(2);
        let errors = validate(&json!([1, 2, 3]), &schema).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.constraint == Constraint::MaxItems && e.path.is_empty()));
    }

    #[test]
    fn test_integer_within_bounds() {
        let schema = SchemaNode::integer().minimum(0.0).maximum(10.0);
        assert_eq!(validate(&json!(5), &schema), Ok(()));
        assert_eq!(validate(&json!(0), &schema), Ok(()));
        assert_eq!(validate(&json!(10), &schema), Ok(()));
    }

    #[test]
    fn test_optional_property_minimum() {
        let schema = SchemaNode::object().property("age", SchemaNode::integer().minimum(0.0));
        let errors = validate(&json!({"age": -1}), &schema).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, Constraint::Minimum);
        assert_eq!(errors[0].path, vec![PathSegment::from("age")]);
    }

    #[test]
    fn test_type_mismatch_does_not_duplicate_for_required() {
        let schema = SchemaNode::object().required("id");
        let errors = validate(&json!("not an object"), &schema).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, Constraint::TypeMismatch);
        assert!(errors[0].message.contains("Expected object, got string"));
    }

    #[test]
    fn test_string_reports_every_failing_rule_in_order() {
        let schema = SchemaNode::string()
            .min_length(5)
            .pattern("^[0-9]+$")
            .unwrap()
            .one_of_values(vec![json!("12345")]);
        assert_eq!(
            constraints(validate(&json!("ab"), &schema)),
            vec![Constraint::MinLength, Constraint::Pattern, Constraint::Enum]
        );
    }

    #[test]
    fn test_max_length_counts_code_points() {
        let schema = SchemaNode::string().max_length(2);
        assert_eq!(validate(&json!("日本"), &schema), Ok(()));
        assert_eq!(
            constraints(validate(&json!("日本語"), &schema)),
            vec![Constraint::MaxLength]
        );
    }

    #[test]
    fn test_phase_order_type_required_properties_constraints() {
        // Object schema on an object value: required first, then nested property errors.
        let schema = SchemaNode::object()
            .required("id")
            .property("tags", SchemaNode::array(SchemaNode::string()).max_items(1));
        let errors = validate(&json!({"tags": ["a", 2]}), &schema).unwrap_err();
        let summary: Vec<_> = errors
            .iter()
            .map(|e| (e.constraint, e.path_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Constraint::Required, "$.id".to_string()),
                (Constraint::MaxItems, "$.tags".to_string()),
                (Constraint::TypeMismatch, "$.tags[1]".to_string()),
            ]
        );
    }

    #[test]
    fn test_properties_follow_declaration_order_not_payload_order() {
        let schema = SchemaNode::object()
            .property("b", SchemaNode::integer())
            .property("a", SchemaNode::integer());
        let errors = validate(&json!({"a": "x", "b": "y"}), &schema).unwrap_err();
        assert_eq!(errors[0].path, vec![PathSegment::from("b")]);
        assert_eq!(errors[1].path, vec![PathSegment::from("a")]);
    }

    #[test]
    fn test_integer_is_a_number_but_not_vice_versa() {
        assert_eq!(validate(&json!(3), &SchemaNode::number()), Ok(()));
        assert_eq!(
            constraints(validate(&json!(3.5), &SchemaNode::integer())),
            vec![Constraint::TypeMismatch]
        );
    }

    #[test]
    fn test_bounds_skipped_on_type_mismatch() {
        let schema = SchemaNode::integer().minimum(10.0);
        assert_eq!(
            constraints(validate(&json!("5"), &schema)),
            vec![Constraint::TypeMismatch]
        );
    }

    #[test]
    fn test_enum_numeric_equality_ignores_representation() {
        let schema = SchemaNode::number().one_of_values(vec![json!(1.0), json!(2.5)]);
        assert_eq!(validate(&json!(1), &schema), Ok(()));
        assert_eq!(constraints(validate(&json!(3), &schema)), vec![Constraint::Enum]);
    }

    #[test]
    fn test_const_reports_enum_constraint() {
        let schema = SchemaNode::string().constant(json!("v1"));
        assert_eq!(validate(&json!("v1"), &schema), Ok(()));
        assert_eq!(constraints(validate(&json!("v2"), &schema)), vec![Constraint::Enum]);
    }

    #[test]
    fn test_boolean_and_null_ignore_enum() {
        let schema = SchemaNode::boolean().one_of_values(vec![json!(true)]);
        assert_eq!(validate(&json!(false), &schema), Ok(()));
        assert_eq!(validate(&json!(null), &SchemaNode::null()), Ok(()));
    }

    #[test]
    fn test_nested_paths_carry_indices() {
        let schema = SchemaNode::object().property(
            "orders",
            SchemaNode::array(
                SchemaNode::object()
                    .required("sku")
                    .property("qty", SchemaNode::integer().minimum(1.0)),
            ),
        );
        let payload = json!({"orders": [{"sku": "a", "qty": 1}, {"qty": 0}]});
        let errors = validate(&payload, &schema).unwrap_err();
        let paths: Vec<_> = errors.iter().map(|e| e.path_string()).collect();
        assert_eq!(paths, vec!["$.orders[1].sku", "$.orders[1].qty"]);
    }

    #[test]
    fn test_validate_at_prefixes_paths() {
        let schema = SchemaNode::object().required("id");
        let errors = validate_at(&json!({}), &schema, &["envelope".into()]).unwrap_err();
        assert_eq!(errors[0].path_string(), "$.envelope.id");
    }

    #[test]
    fn test_depth_limit_yields_internal() {
        let mut schema = SchemaNode::any_array();
        let mut payload = json!([]);
        for _ in 0..5 {
            schema = SchemaNode::array(schema);
            payload = json!([payload]);
        }
        let options = ValidationOptions { max_depth: 2 };
        let errors = validate_with(&payload, &schema, &[], &options).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, Constraint::Internal);
        assert_eq!(errors[0].path.len(), 3);
    }

    #[test]
    fn test_fault_becomes_single_internal_error() {
        let path = vec![PathSegment::from("envelope"), PathSegment::from(3usize)];
        let errors = fault_boundary(&path, || panic!("corrupt schema graph")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, Constraint::Internal);
        assert_eq!(errors[0].path, path);
        assert!(errors[0].message.contains("corrupt schema graph"));

        let errors = fault_boundary(&[], || panic!("{} faults", 2)).unwrap_err();
        assert!(errors[0].message.contains("2 faults"));
    }

    #[test]
    fn test_fault_boundary_passes_results_through() {
        assert_eq!(fault_boundary(&[], || Ok(())), Ok(()));
        let err = ValidationError::internal(Vec::new(), "x");
        assert_eq!(fault_boundary(&[], || Err(vec![err.clone()])), Err(vec![err]));
    }

    #[test]
    fn test_integer_bounds_beyond_f64_precision() {
        let schema = parse_schema(&json!({"type": "integer", "maximum": 9_007_199_254_740_992_u64}))
            .unwrap();
        assert_eq!(validate(&json!(9_007_199_254_740_992_u64), &schema), Ok(()));
        assert_eq!(
            constraints(validate(&json!(9_007_199_254_740_993_u64), &schema)),
            vec![Constraint::Maximum]
        );

        let schema = SchemaNode::integer().exact_minimum(i64::MIN + 1);
        assert_eq!(
            constraints(validate(&json!(i64::MIN), &schema)),
            vec![Constraint::Minimum]
        );
    }

    #[test]
    fn test_fractional_bound_on_integer_schema() {
        let schema = SchemaNode::integer().minimum(2.5);
        assert_eq!(constraints(validate(&json!(2), &schema)), vec![Constraint::Minimum]);
        assert_eq!(validate(&json!(3), &schema), Ok(()));
    }

    #[test]
    fn test_integral_float_satisfies_integer_schema() {
        let schema = SchemaNode::integer().minimum(0.0).maximum(10.0);
        assert_eq!(validate(&json!(1.0), &schema), Ok(()));
        assert_eq!(constraints(validate(&json!(11.0), &schema)), vec![Constraint::Maximum]);
    }

    #[test]
    fn test_idempotent() {
        let schema = SchemaNode::object()
            .required("a")
            .property("b", SchemaNode::string().min_length(4));
        let payload = json!({"b": "x"});
        assert_eq!(validate(&payload, &schema), validate(&payload, &schema));
    }
}
