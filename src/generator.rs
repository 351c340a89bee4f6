//! Example and counter-example generation
//!
//! Seeds test suites from a schema: [`ExampleGenerator::example`] builds one
//! value that conforms, [`ExampleGenerator::negative_cases`] builds values that
//! each break a specific rule.
//!
//! Generation is deterministic. The random source is re-seeded from the
//! generator's seed on every call, so the same `(seed, schema)` always yields
//! the same value and golden files stay stable across runs.

use chrono::{SecondsFormat, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use tracing::warn;

use crate::schema::{ArrayRules, NumericBounds, ObjectRules, SchemaKind, SchemaNode, StringRules};
use crate::validator::{validate, DEFAULT_MAX_DEPTH};
use crate::value::{as_integer, char_length, compare_numbers, integer_number, ValueKind};
use crate::violation::Constraint;

/// Seed used by the free functions
pub const DEFAULT_SEED: u64 = 0;

const PLACEHOLDER: &str = "example";
const DEFAULT_INTEGER: i64 = 42;
const DEFAULT_NUMBER: f64 = 1.5;

/// Longest string the generator will build
const MAX_GENERATED_LENGTH: usize = 1 << 16;
/// Most array elements the generator will build
const MAX_GENERATED_ITEMS: usize = 1 << 12;

/// A value expected to fail validation, and the rule it targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeCase {
    pub label: String,
    pub value: Value,
    /// Validation must report at least one error with this constraint
    pub expected: Constraint,
}

impl NegativeCase {
    fn new(label: &str, value: Value, expected: Constraint) -> Self {
        Self {
            label: label.to_string(),
            value,
            expected,
        }
    }
}

/// Deterministic example generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleGenerator {
    seed: u64,
}

impl Default for ExampleGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl ExampleGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A value that satisfies `schema`
    pub fn example(&self, schema: &SchemaNode) -> Value {
        let mut rng = StdRng::seed_from_u64(self.seed);
        example_node(schema, &mut rng, 0)
    }

    /// Values that each violate one rule of `schema`.
    ///
    /// Only cases guaranteed to fail for this particular schema are emitted:
    /// a wrong-kind string is pointless against a string schema, an empty list
    /// only fails an array schema with `min_items`, and so on.
    pub fn negative_cases(&self, schema: &SchemaNode) -> Vec<NegativeCase> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let kind = schema.value_kind();
        let mut cases = Vec::new();

        if !kind.accepts(ValueKind::String) {
            cases.push(NegativeCase::new(
                "wrong_kind_string",
                Value::String("not-a-valid-value".into()),
                Constraint::TypeMismatch,
            ));
        }
        if !kind.accepts(ValueKind::Number) {
            cases.push(NegativeCase::new(
                "wrong_kind_number",
                float(DEFAULT_NUMBER),
                Constraint::TypeMismatch,
            ));
        }
        match &schema.kind {
            SchemaKind::Array(rules) if rules.min_items.unwrap_or(0) > 0 => {
                cases.push(NegativeCase::new("empty_list", Value::Array(Vec::new()), Constraint::MinItems));
            }
            SchemaKind::Array(_) => {}
            _ => cases.push(NegativeCase::new(
                "empty_list",
                Value::Array(Vec::new()),
                Constraint::TypeMismatch,
            )),
        }
        if kind != ValueKind::Null {
            cases.push(NegativeCase::new("null", Value::Null, Constraint::TypeMismatch));
        }

        match &schema.kind {
            SchemaKind::Object(rules) => object_cases(rules, &mut cases),
            SchemaKind::String(rules) => string_cases(schema, rules, &mut cases),
            SchemaKind::Integer(bounds) => integer_cases(schema, bounds, &mut cases),
            SchemaKind::Number(bounds) => number_cases(schema, bounds, &mut cases),
            SchemaKind::Array(rules) => array_cases(rules, &mut rng, &mut cases),
            SchemaKind::Boolean | SchemaKind::Null => {}
        }

        cases
    }
}

/// [`ExampleGenerator::example`] with [`DEFAULT_SEED`]
pub fn generate_example(schema: &SchemaNode) -> Value {
    ExampleGenerator::default().example(schema)
}

/// [`ExampleGenerator::negative_cases`] with [`DEFAULT_SEED`]
pub fn generate_negative_cases(schema: &SchemaNode) -> Vec<NegativeCase> {
    ExampleGenerator::default().negative_cases(schema)
}

// =============================================================================
// Positive examples
// =============================================================================

fn example_node(schema: &SchemaNode, rng: &mut StdRng, depth: usize) -> Value {
    if depth > DEFAULT_MAX_DEPTH {
        warn!(depth, "example generation truncated at maximum depth");
        return Value::Null;
    }

    if let Some(constant) = &schema.const_value {
        return constant.clone();
    }
    if let Some(members) = &schema.enum_values {
        let conforming: Vec<&Value> = members
            .iter()
            .filter(|member| validate(member, schema).is_ok())
            .collect();
        if let Some(choice) = conforming.choose(rng) {
            return (*choice).clone();
        }
    }

    match &schema.kind {
        SchemaKind::Null => Value::Null,
        SchemaKind::Boolean => Value::Bool(true),
        SchemaKind::Integer(bounds) => integer_example(bounds),
        SchemaKind::Number(bounds) => number_example(bounds),
        SchemaKind::String(rules) => Value::String(string_example(rules)),
        SchemaKind::Array(rules) => array_example(rules, rng, depth),
        SchemaKind::Object(rules) => object_example(rules, rng, depth),
    }
}

/// Smallest integer at or above `bound`
fn ceil_integer(bound: &Number) -> Option<i128> {
    as_integer(bound).or_else(|| bound.as_f64().map(|f| f.ceil() as i128))
}

/// Largest integer at or below `bound`
fn floor_integer(bound: &Number) -> Option<i128> {
    as_integer(bound).or_else(|| bound.as_f64().map(|f| f.floor() as i128))
}

fn integer_example(bounds: &NumericBounds) -> Value {
    let low = bounds.minimum.as_ref().and_then(ceil_integer);
    let high = bounds.maximum.as_ref().and_then(floor_integer);
    let choice = match (low, high) {
        (Some(low), Some(high)) if low.saturating_add(1) <= high => low + 1,
        (Some(low), Some(_)) => low,
        (Some(low), None) => low.saturating_add(1),
        (None, Some(high)) => high.saturating_sub(1),
        (None, None) => i128::from(DEFAULT_INTEGER),
    };
    match integer_number(choice) {
        Some(n) => Value::Number(n),
        None => {
            warn!(?bounds, "no representable integer satisfies bounds");
            Value::Null
        }
    }
}

fn number_example(bounds: &NumericBounds) -> Value {
    let low = bounds.minimum.as_ref().and_then(Number::as_f64);
    let high = bounds.maximum.as_ref().and_then(Number::as_f64);
    let guess = match (low, high) {
        (Some(low), Some(high)) if low + 1.0 <= high => low + 1.0,
        (Some(low), Some(high)) => low + (high - low) / 2.0,
        (Some(low), None) => low + 1.0,
        (None, Some(high)) => high - 1.0,
        (None, None) => DEFAULT_NUMBER,
    };

    // Rounding can push the guess past a bound; the bound itself always fits.
    let guess = Number::from_f64(guess);
    if let Some(min) = &bounds.minimum {
        if guess.as_ref().map_or(true, |g| compare_numbers(g, min) == Some(Ordering::Less)) {
            return Value::Number(min.clone());
        }
    }
    if let Some(max) = &bounds.maximum {
        if guess.as_ref().map_or(true, |g| compare_numbers(g, max) == Some(Ordering::Greater)) {
            return Value::Number(max.clone());
        }
    }
    guess.map(Value::Number).unwrap_or(Value::Null)
}

fn format_literal(format: &str) -> Option<String> {
    match format {
        "email" => Some("user@example.com".to_string()),
        "uuid" => Some("123e4567-e89b-12d3-a456-426614174000".to_string()),
        "date-time" => Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        "date" => Some("2024-01-01".to_string()),
        "uri" | "url" => Some("https://example.com".to_string()),
        _ => None,
    }
}

fn satisfies(candidate: &str, rules: &StringRules) -> bool {
    let length = char_length(candidate);
    rules.min_length.map_or(true, |min| length >= min)
        && rules.max_length.map_or(true, |max| length <= max)
        && rules.pattern.as_ref().map_or(true, |p| p.is_match(candidate))
}

/// Pad (repeating the last character) or truncate to fit the length rules
fn fit_length(candidate: &str, rules: &StringRules) -> String {
    let mut out: String = match rules.max_length {
        Some(max) => candidate.chars().take(max).collect(),
        None => candidate.to_string(),
    };
    let filler = out.chars().last().unwrap_or('x');
    let mut min = rules.min_length.unwrap_or(0);
    if min > MAX_GENERATED_LENGTH {
        warn!(min_length = min, "string example capped below min_length");
        min = MAX_GENERATED_LENGTH;
    }
    let length = char_length(&out);
    if length < min {
        out.extend(std::iter::repeat(filler).take(min - length));
    }
    out
}

fn string_example(rules: &StringRules) -> String {
    let literal = rules.format.as_deref().and_then(format_literal);
    if rules.pattern.is_none() {
        return match literal {
            Some(literal) if satisfies(&literal, rules) => literal,
            _ => fit_length(PLACEHOLDER, rules),
        };
    }

    // A pattern cannot be inverted in general; search a fixed candidate pool.
    let mut candidates: Vec<String> = literal.into_iter().collect();
    candidates.extend(
        [
            PLACEHOLDER,
            "abc123",
            "ABCdef",
            "0123456789",
            "user@example.com",
            "https://example.com",
            "2024-01-01",
            "123e4567-e89b-12d3-a456-426614174000",
            "",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    for n in 1..=16 {
        for unit in ["0", "1", "a", "A", "x"] {
            candidates.push(unit.repeat(n));
        }
    }

    if let Some(hit) = candidates.iter().find(|c| satisfies(c, rules)) {
        return hit.clone();
    }
    if let Some(hit) = candidates
        .iter()
        .map(|c| fit_length(c, rules))
        .find(|c| satisfies(c, rules))
    {
        return hit;
    }

    warn!(
        pattern = rules.pattern.as_ref().map(|p| p.as_str()),
        "no generated candidate satisfies string rules"
    );
    fit_length(PLACEHOLDER, rules)
}

fn array_example(rules: &ArrayRules, rng: &mut StdRng, depth: usize) -> Value {
    let mut count = rules
        .min_items
        .unwrap_or(0)
        .max(1)
        .min(rules.max_items.unwrap_or(usize::MAX));
    if count > MAX_GENERATED_ITEMS {
        warn!(min_items = count, "array example capped below min_items");
        count = MAX_GENERATED_ITEMS;
    }
    let elements = (0..count)
        .map(|_| match &rules.items {
            Some(items) => example_node(items, rng, depth + 1),
            None => Value::Null,
        })
        .collect();
    Value::Array(elements)
}

fn object_example(rules: &ObjectRules, rng: &mut StdRng, depth: usize) -> Value {
    let mut map = Map::new();
    for (name, schema) in &rules.properties {
        map.insert(name.clone(), example_node(schema, rng, depth + 1));
    }
    // Required names without a declared schema still need to be present
    for name in &rules.required {
        if !map.contains_key(name) {
            map.insert(name.clone(), Value::Null);
        }
    }
    Value::Object(map)
}

fn float(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

// =============================================================================
// Negative cases
// =============================================================================

fn object_cases(rules: &ObjectRules, cases: &mut Vec<NegativeCase>) {
    if rules.required.is_empty() {
        return;
    }
    cases.push(NegativeCase::new(
        "empty_object",
        Value::Object(Map::new()),
        Constraint::Required,
    ));

    let mut unknown = String::from("unexpected_field");
    while rules.property(&unknown).is_some() || rules.required.contains(&unknown) {
        unknown.insert(0, '_');
    }
    let mut extra = Map::new();
    extra.insert(unknown, Value::Bool(true));
    cases.push(NegativeCase::new(
        "unknown_field",
        Value::Object(extra),
        Constraint::Required,
    ));
}

fn string_cases(schema: &SchemaNode, rules: &StringRules, cases: &mut Vec<NegativeCase>) {
    if let Some(min) = rules.min_length.filter(|min| *min > 0) {
        if let Some(length) = within_limit(min - 1, MAX_GENERATED_LENGTH, "too_short") {
            cases.push(NegativeCase::new(
                "too_short",
                Value::String("a".repeat(length)),
                Constraint::MinLength,
            ));
        }
    }
    if let Some(max) = rules.max_length {
        let length = max
            .checked_add(1)
            .and_then(|length| within_limit(length, MAX_GENERATED_LENGTH, "too_long"));
        if let Some(length) = length {
            cases.push(NegativeCase::new(
                "too_long",
                Value::String("a".repeat(length)),
                Constraint::MaxLength,
            ));
        }
    }
    if let Some(pattern) = &rules.pattern {
        let miss = ["", " ", "!", "~~~", "0", "a", "A", "\n"]
            .iter()
            .find(|candidate| !pattern.is_match(candidate));
        if let Some(miss) = miss {
            cases.push(NegativeCase::new(
                "pattern_mismatch",
                Value::String((*miss).to_string()),
                Constraint::Pattern,
            ));
        }
    }
    if let Some(members) = &schema.enum_values {
        let mut outsider = String::from("not_in_enum");
        while members.iter().any(|m| m.as_str() == Some(outsider.as_str())) {
            outsider.push('_');
        }
        cases.push(NegativeCase::new(
            "not_in_enum",
            Value::String(outsider),
            Constraint::Enum,
        ));
    }
}

fn integer_cases(schema: &SchemaNode, bounds: &NumericBounds, cases: &mut Vec<NegativeCase>) {
    let below = bounds
        .minimum
        .as_ref()
        .and_then(ceil_integer)
        .and_then(|low| integer_number(low.checked_sub(1)?));
    if let Some(below) = below {
        cases.push(NegativeCase::new("below_minimum", Value::Number(below), Constraint::Minimum));
    }
    let above = bounds
        .maximum
        .as_ref()
        .and_then(floor_integer)
        .and_then(|high| integer_number(high.checked_add(1)?));
    if let Some(above) = above {
        cases.push(NegativeCase::new("above_maximum", Value::Number(above), Constraint::Maximum));
    }
    if let Some(members) = &schema.enum_values {
        let outsider = (0_i64..)
            .map(Value::from)
            .find(|candidate| !members.iter().any(|m| crate::validator::literal_eq(m, candidate)));
        if let Some(outsider) = outsider {
            cases.push(NegativeCase::new("not_in_enum", outsider, Constraint::Enum));
        }
    }
}

/// A finite float strictly on the far side of `bound`, stepping away from it
/// until rounding can no longer land back inside
fn beyond(bound: &Number, away: Ordering) -> Option<Number> {
    let start = bound.as_f64()?;
    let step = |f: f64| f.abs().max(1.0) * f64::EPSILON;
    let mut candidate = match away {
        Ordering::Less => start - 1.0,
        _ => start + 1.0,
    };
    for _ in 0..8 {
        let n = Number::from_f64(candidate)?;
        if compare_numbers(&n, bound) == Some(away) {
            return Some(n);
        }
        candidate = match away {
            Ordering::Less => candidate - step(candidate),
            _ => candidate + step(candidate),
        };
    }
    None
}

fn number_cases(schema: &SchemaNode, bounds: &NumericBounds, cases: &mut Vec<NegativeCase>) {
    if let Some(below) = bounds.minimum.as_ref().and_then(|min| beyond(min, Ordering::Less)) {
        cases.push(NegativeCase::new("below_minimum", Value::Number(below), Constraint::Minimum));
    }
    if let Some(above) = bounds.maximum.as_ref().and_then(|max| beyond(max, Ordering::Greater)) {
        cases.push(NegativeCase::new("above_maximum", Value::Number(above), Constraint::Maximum));
    }
    if let Some(members) = &schema.enum_values {
        let outsider = (0_u32..)
            .map(|i| float(f64::from(i) + 0.5))
            .find(|candidate| !members.iter().any(|m| crate::validator::literal_eq(m, candidate)));
        if let Some(outsider) = outsider {
            cases.push(NegativeCase::new("not_in_enum", outsider, Constraint::Enum));
        }
    }
}

/// `size` if the generator may build something that large
fn within_limit(size: usize, limit: usize, label: &str) -> Option<usize> {
    if size > limit {
        warn!(size, limit, case = label, "skipping oversized negative case");
        return None;
    }
    Some(size)
}

fn array_cases(rules: &ArrayRules, rng: &mut StdRng, cases: &mut Vec<NegativeCase>) {
    let element = |rng: &mut StdRng| match &rules.items {
        Some(items) => example_node(items, rng, 1),
        None => Value::Null,
    };

    if let Some(min) = rules.min_items.filter(|min| *min > 1) {
        if let Some(count) = within_limit(min - 1, MAX_GENERATED_ITEMS, "too_few_items") {
            let elements = (0..count).map(|_| element(rng)).collect();
            cases.push(NegativeCase::new("too_few_items", Value::Array(elements), Constraint::MinItems));
        }
    }
    if let Some(max) = rules.max_items {
        let count = max
            .checked_add(1)
            .and_then(|count| within_limit(count, MAX_GENERATED_ITEMS, "too_many_items"));
        if let Some(count) = count {
            let elements = (0..count).map(|_| element(rng)).collect();
            cases.push(NegativeCase::new("too_many_items", Value::Array(elements), Constraint::MaxItems));
        }
    }
}
