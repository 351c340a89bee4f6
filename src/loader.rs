//! Catalog loading
//!
//! Materializes a [`SchemaCatalog`] from a JSON document holding component
//! schemas (a JSON-Schema subset) and messages:
//!
//! ```json
//! {
//!   "components": { "schemas": { "User": { "type": "object", "required": ["id"] } } },
//!   "messages":   { "user.created": { "payload": "#/components/schemas/User" } }
//! }
//! ```
//!
//! Local `$ref`s between components are followed through a dependency graph.
//! Components are built in reverse topological order so every reference is
//! already materialized when it is needed; any reference cycle is rejected.
//! The loader does no I/O of its own.

use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, SchemaError};
use crate::resolver::SchemaCatalog;
use crate::schema::{
    ArrayRules, Message, NumericBounds, ObjectRules, Pattern, PayloadRef, SchemaKind, SchemaNode,
    StringRules, COMPONENTS_PREFIX,
};
use crate::value::{normalize_number, ValueKind};

/// Composition keywords outside the supported subset
const UNSUPPORTED_KEYWORDS: &[&str] = &["allOf", "anyOf", "oneOf", "not", "if", "then", "else"];

/// Load a catalog from its JSON text
pub fn load_catalog_str(document: &str) -> Result<SchemaCatalog> {
    let value: Value = serde_json::from_str(document)?;
    load_catalog(&value)
}

/// Load a catalog from a parsed JSON document
pub fn load_catalog(document: &Value) -> Result<SchemaCatalog> {
    let root = document
        .as_object()
        .ok_or_else(|| SchemaError::invalid("#", "catalog document must be an object"))?;

    let empty = Map::new();
    let components = match root.get("components").and_then(|c| c.get("schemas")) {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(SchemaError::invalid(
                "#/components/schemas",
                "expected an object of named schemas",
            ))
        }
        None => &empty,
    };

    let built = build_components(components)?;

    let mut catalog = SchemaCatalog::new();
    for (name, schema) in &built {
        catalog.add_schema(name.clone(), (**schema).clone())?;
    }

    if let Some(messages) = root.get("messages") {
        let messages = messages
            .as_object()
            .ok_or_else(|| SchemaError::invalid("#/messages", "expected an object of messages"))?;
        for (name, definition) in messages {
            let message = parse_message(name, definition, &built)?;
            if let PayloadRef::Named(target) = &message.payload {
                if !built.contains_key(target) {
                    warn!(message = %name, reference = %message.payload, "message payload does not resolve");
                }
            }
            catalog.add_message(message)?;
        }
    }

    debug!(
        schemas = catalog.schema_count(),
        messages = catalog.message_count(),
        "loaded catalog"
    );
    Ok(catalog)
}

/// Parse a standalone schema. `$ref`s are not available here.
pub fn parse_schema(schema: &Value) -> Result<SchemaNode> {
    SchemaBuilder {
        components: &HashMap::new(),
    }
    .build(schema, "#")
}

fn parse_message(
    name: &str,
    definition: &Value,
    components: &HashMap<String, Arc<SchemaNode>>,
) -> Result<Message> {
    let path = format!("#/messages/{}", name);
    let payload = match definition {
        Value::String(reference) => reference,
        Value::Object(map) => match map.get("payload") {
            Some(Value::String(reference)) => reference,
            Some(inline @ Value::Object(_)) => {
                let schema = SchemaBuilder { components }.build(inline, &format!("{}/payload", path))?;
                return Ok(Message::inline(name, schema));
            }
            Some(_) => return Err(SchemaError::invalid(path, "payload must be a reference or a schema")),
            None => return Err(SchemaError::invalid(path, "missing payload")),
        },
        _ => return Err(SchemaError::invalid(path, "message must be an object or a reference")),
    };
    Ok(Message::new(name, payload))
}

// =============================================================================
// Component graph
// =============================================================================

fn build_components(components: &Map<String, Value>) -> Result<HashMap<String, Arc<SchemaNode>>> {
    let mut graph: DiGraph<String, ()> = DiGraph::with_capacity(components.len(), components.len());
    let mut indices: HashMap<&str, NodeIndex> = HashMap::with_capacity(components.len());
    for name in components.keys() {
        indices.insert(name.as_str(), graph.add_node(name.clone()));
    }

    for (name, schema) in components {
        let mut refs = Vec::new();
        collect_refs(schema, &component_path(name), &mut refs)?;
        for (at, target) in refs {
            let to = *indices
                .get(target.as_str())
                .ok_or_else(|| SchemaError::invalid(at, format!("unknown reference '{}'", target)))?;
            graph.update_edge(indices[name.as_str()], to, ());
        }
    }

    for scc in kosaraju_scc(&graph) {
        let self_loop = scc.len() == 1 && graph.contains_edge(scc[0], scc[0]);
        if scc.len() > 1 || self_loop {
            let mut cycle: Vec<String> = scc.iter().map(|idx| graph[*idx].clone()).collect();
            cycle.sort();
            cycle.push(cycle[0].clone());
            return Err(SchemaError::CyclicReference(cycle));
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        let name = graph[cycle.node_id()].clone();
        SchemaError::CyclicReference(vec![name.clone(), name])
    })?;

    let mut built: HashMap<String, Arc<SchemaNode>> = HashMap::with_capacity(components.len());
    // Edges point at dependencies, so build from the back of the order.
    for idx in order.into_iter().rev() {
        let name = graph[idx].clone();
        let node = SchemaBuilder { components: &built }.build(&components[&name], &component_path(&name))?;
        built.insert(name, Arc::new(node));
    }
    Ok(built)
}

fn component_path(name: &str) -> String {
    format!("{}{}", COMPONENTS_PREFIX, name)
}

/// Every local `$ref` below `schema`, with the path it appears at
fn collect_refs(schema: &Value, path: &str, out: &mut Vec<(String, String)>) -> Result<()> {
    match schema {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref") {
                out.push((path.to_string(), ref_target(reference, path)?));
            }
            for (key, child) in map {
                match (key.as_str(), child) {
                    // enum/const members are literals, not schemas
                    ("enum", _) | ("const", _) => {}
                    ("properties", Value::Object(properties)) => {
                        for (name, property) in properties {
                            collect_refs(property, &format!("{}/properties/{}", path, name), out)?;
                        }
                    }
                    _ => collect_refs(child, &format!("{}/{}", path, key), out)?,
                }
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_refs(child, &format!("{}/{}", path, i), out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn ref_target(reference: &Value, path: &str) -> Result<String> {
    let reference = reference
        .as_str()
        .ok_or_else(|| SchemaError::invalid(path, "$ref must be a string"))?;
    reference
        .strip_prefix(COMPONENTS_PREFIX)
        .map(str::to_string)
        .ok_or_else(|| SchemaError::unsupported(path, format!("non-local reference '{}'", reference)))
}

// =============================================================================
// JSON Schema subset -> SchemaNode
// =============================================================================

struct SchemaBuilder<'a> {
    components: &'a HashMap<String, Arc<SchemaNode>>,
}

impl SchemaBuilder<'_> {
    fn build(&self, schema: &Value, path: &str) -> Result<SchemaNode> {
        let map = schema
            .as_object()
            .ok_or_else(|| SchemaError::invalid(path, "schema must be an object"))?;

        if let Some(keyword) = UNSUPPORTED_KEYWORDS.iter().find(|k| map.contains_key(**k)) {
            return Err(SchemaError::unsupported(path, *keyword));
        }

        if let Some(reference) = map.get("$ref") {
            let target = ref_target(reference, path)?;
            return self
                .components
                .get(&target)
                .map(|node| (**node).clone())
                .ok_or_else(|| SchemaError::NotFound(target));
        }

        let kind = match map.get("type") {
            Some(Value::String(name)) => self.kind_named(name, map, path)?,
            Some(Value::Array(_)) => return Err(SchemaError::unsupported(path, "type arrays")),
            Some(_) => return Err(SchemaError::invalid(path, "type must be a string")),
            None => {
                let inferred = infer_type(map)
                    .ok_or_else(|| SchemaError::invalid(path, "missing type and nothing to infer it from"))?;
                self.kind_named(inferred, map, path)?
            }
        };

        let enum_values = match map.get("enum") {
            Some(Value::Array(values)) => Some(values.clone()),
            Some(_) => return Err(SchemaError::invalid(path, "enum must be an array")),
            None => None,
        };

        Ok(SchemaNode {
            kind,
            enum_values,
            const_value: map.get("const").cloned(),
            title: map.get("title").and_then(Value::as_str).map(str::to_string),
        })
    }

    fn kind_named(&self, name: &str, map: &Map<String, Value>, path: &str) -> Result<SchemaKind> {
        let kind = match name {
            "null" => SchemaKind::Null,
            "boolean" => SchemaKind::Boolean,
            "integer" => SchemaKind::Integer(bounds(map, path)?),
            "number" => SchemaKind::Number(bounds(map, path)?),
            "string" => SchemaKind::String(StringRules {
                min_length: count(map, "minLength", path)?,
                max_length: count(map, "maxLength", path)?,
                pattern: match map.get("pattern") {
                    Some(Value::String(source)) => Some(Pattern::new(source)?),
                    Some(_) => return Err(SchemaError::invalid(path, "pattern must be a string")),
                    None => None,
                },
                format: map.get("format").and_then(Value::as_str).map(str::to_string),
            }),
            "array" => SchemaKind::Array(ArrayRules {
                items: match map.get("items") {
                    Some(items) => Some(Arc::new(self.build(items, &format!("{}/items", path))?)),
                    None => None,
                },
                min_items: count(map, "minItems", path)?,
                max_items: count(map, "maxItems", path)?,
            }),
            "object" => SchemaKind::Object(self.object_rules(map, path)?),
            other => return Err(SchemaError::invalid(path, format!("unknown type '{}'", other))),
        };
        Ok(kind)
    }

    fn object_rules(&self, map: &Map<String, Value>, path: &str) -> Result<ObjectRules> {
        let mut rules = ObjectRules::default();

        match map.get("properties") {
            Some(Value::Object(properties)) => {
                for (name, schema) in properties {
                    let node = self.build(schema, &format!("{}/properties/{}", path, name))?;
                    rules.properties.push((name.clone(), Arc::new(node)));
                }
            }
            Some(_) => return Err(SchemaError::invalid(path, "properties must be an object")),
            None => {}
        }

        match map.get("required") {
            Some(Value::Array(names)) => {
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| SchemaError::invalid(path, "required entries must be strings"))?;
                    rules.required.push(name.to_string());
                }
            }
            Some(_) => return Err(SchemaError::invalid(path, "required must be an array")),
            None => {}
        }

        Ok(rules)
    }
}

fn infer_type(map: &Map<String, Value>) -> Option<&'static str> {
    if map.contains_key("properties") || map.contains_key("required") {
        return Some("object");
    }
    if map.contains_key("items") || map.contains_key("minItems") || map.contains_key("maxItems") {
        return Some("array");
    }
    let literal = map
        .get("const")
        .or_else(|| map.get("enum").and_then(Value::as_array).and_then(|v| v.first()))?;
    Some(ValueKind::of(literal).name())
}

fn bounds(map: &Map<String, Value>, path: &str) -> Result<NumericBounds> {
    let bound = |key: &str| -> Result<Option<Number>> {
        match map.get(key) {
            Some(Value::Number(n)) => Ok(Some(normalize_number(n.clone()))),
            Some(_) => Err(SchemaError::invalid(path, format!("{} must be a number", key))),
            None => Ok(None),
        }
    };
    Ok(NumericBounds {
        minimum: bound("minimum")?,
        maximum: bound("maximum")?,
    })
}

fn count(map: &Map<String, Value>, key: &str, path: &str) -> Result<Option<usize>> {
    match map.get(key) {
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| SchemaError::invalid(path, format!("{} must be a non-negative integer", key))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MessageResolver;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "components": {
                "schemas": {
                    "Order": {
                        "type": "object",
                        "required": ["id", "customer"],
                        "properties": {
                            "id": {"type": "string", "format": "uuid"},
                            "customer": {"$ref": "#/components/schemas/Customer"},
                            "lines": {"type": "array", "items": {"$ref": "#/components/schemas/Line"}, "minItems": 1}
                        }
                    },
                    "Customer": {
                        "type": "object",
                        "required": ["email"],
                        "properties": {"email": {"type": "string", "pattern": "@"}}
                    },
                    "Line": {
                        "properties": {
                            "qty": {"type": "integer", "minimum": 1},
                            "unit": {"enum": ["kg", "pcs"]}
                        }
                    }
                }
            },
            "messages": {
                "order.placed": {"payload": "#/components/schemas/Order"},
                "order.ping": {"payload": {"type": "null"}},
                "order.legacy": "Customer"
            }
        })
    }

    #[test]
    fn test_loads_components_and_messages() {
        let catalog = load_catalog(&document()).unwrap();
        assert_eq!(catalog.schema_names(), vec!["Customer", "Line", "Order"]);
        assert_eq!(catalog.message_names(), vec!["order.legacy", "order.ping", "order.placed"]);
        assert!(catalog.resolve("order.ping").is_ok());
        assert!(catalog.resolve("order.legacy").is_ok());
    }

    #[test]
    fn test_refs_are_inlined_and_order_kept() {
        let catalog = load_catalog(&document()).unwrap();
        let order = catalog.resolve("order.placed").unwrap();
        let SchemaKind::Object(rules) = &order.kind else {
            panic!("expected object");
        };
        let names: Vec<_> = rules.properties.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["id", "customer", "lines"]);
        assert_eq!(rules.property("customer").unwrap().value_kind(), ValueKind::Object);
    }

    #[test]
    fn test_types_are_inferred() {
        let catalog = load_catalog(&document()).unwrap();
        let line = catalog.schema("Line").unwrap();
        assert_eq!(line.value_kind(), ValueKind::Object);
        let SchemaKind::Object(rules) = &line.kind else {
            panic!("expected object");
        };
        assert_eq!(rules.property("unit").unwrap().value_kind(), ValueKind::String);
    }

    #[test]
    fn test_self_reference_rejected() {
        let doc = json!({"components": {"schemas": {
            "Node": {"type": "object", "properties": {"next": {"$ref": "#/components/schemas/Node"}}}
        }}});
        match load_catalog(&doc) {
            Err(SchemaError::CyclicReference(names)) => assert_eq!(names, vec!["Node", "Node"]),
            other => panic!("expected cycle, got {:?}", other.map(|c| c.schema_count())),
        }
    }

    #[test]
    fn test_mutual_reference_rejected() {
        let doc = json!({"components": {"schemas": {
            "A": {"type": "array", "items": {"$ref": "#/components/schemas/B"}},
            "B": {"type": "object", "properties": {"a": {"$ref": "#/components/schemas/A"}}}
        }}});
        match load_catalog(&doc) {
            Err(SchemaError::CyclicReference(names)) => assert_eq!(names, vec!["A", "B", "A"]),
            other => panic!("expected cycle, got {:?}", other.map(|c| c.schema_count())),
        }
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let doc = json!({"components": {"schemas": {
            "A": {"$ref": "#/components/schemas/Missing"}
        }}});
        assert!(matches!(load_catalog(&doc), Err(SchemaError::InvalidFormat { .. })));
    }

    #[test]
    fn test_unsupported_constructs() {
        assert!(matches!(
            parse_schema(&json!({"oneOf": [{"type": "string"}]})),
            Err(SchemaError::Unsupported { .. })
        ));
        assert!(matches!(
            parse_schema(&json!({"type": ["string", "null"]})),
            Err(SchemaError::Unsupported { .. })
        ));
        assert!(matches!(
            parse_schema(&json!({"$ref": "https://example.com/s.json"})),
            Err(SchemaError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_bad_pattern_surfaces_at_load_time() {
        assert!(matches!(
            parse_schema(&json!({"type": "string", "pattern": "("})),
            Err(SchemaError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_dangling_message_reference_loads() {
        let doc = json!({"messages": {"m": {"payload": "#/components/schemas/Gone"}}});
        let catalog = load_catalog(&doc).unwrap();
        assert_eq!(catalog.dangling_messages().len(), 1);
    }

    #[test]
    fn test_parse_schema_numeric_bounds() {
        let node = parse_schema(&json!({"type": "integer", "minimum": 0, "maximum": 10})).unwrap();
        assert_eq!(node, SchemaNode::integer().minimum(0.0).maximum(10.0));
        assert!(parse_schema(&json!({"type": "integer", "minimum": "0"})).is_err());
        assert_eq!(
            parse_schema(&json!({"type": "number", "maximum": 10.0})).unwrap(),
            SchemaNode::number().maximum(10.0)
        );
    }

    #[test]
    fn test_large_integer_bound_kept_exact() {
        let node = parse_schema(&json!({"type": "integer", "minimum": 9_007_199_254_740_993_u64})).unwrap();
        assert_eq!(node, SchemaNode::integer().exact_minimum(9_007_199_254_740_993_u64));
    }
}
