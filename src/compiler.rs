//! Validator Compiler
//!
//! Turns a message name into a reusable [`CompiledValidator`] that closes over
//! the already-resolved schema, so repeated calls pay no lookup cost.
//!
//! Compilation never fails. A message that cannot be resolved still yields a
//! validator; invoking it returns the `NotFound` / `NoSchema` error. Pipelines
//! can therefore build a whole table of validators up front and see bad
//! entries surface at validation time alongside ordinary payload errors.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::resolver::{MessageResolver, Resolution};
use crate::schema::SchemaNode;
use crate::validator::{validate_with, ValidationOptions};
use crate::violation::{ValidationError, ValidationOutcome};

type CheckFn = dyn Fn(&Value) -> ValidationOutcome + Send + Sync;

/// A validator bound to one message type
#[derive(Clone)]
pub struct CompiledValidator {
    message: Arc<str>,
    schema: Option<Arc<SchemaNode>>,
    check: Arc<CheckFn>,
}

impl CompiledValidator {
    /// Validator over an already-resolved schema
    pub fn for_schema(message: &str, schema: Arc<SchemaNode>, options: ValidationOptions) -> Self {
        let captured = Arc::clone(&schema);
        Self {
            message: Arc::from(message),
            schema: Some(schema),
            check: Arc::new(move |payload: &Value| {
                validate_with(payload, &captured, &[], &options)
            }),
        }
    }

    /// Validator that always reports `error`
    pub fn failing(message: &str, error: ValidationError) -> Self {
        Self {
            message: Arc::from(message),
            schema: None,
            check: Arc::new(move |_payload: &Value| Err(vec![error.clone()])),
        }
    }

    /// Name of the message this validator was compiled for
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The resolved schema, if resolution succeeded
    pub fn schema(&self) -> Option<&Arc<SchemaNode>> {
        self.schema.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.schema.is_some()
    }

    pub fn validate(&self, payload: &Value) -> ValidationOutcome {
        (self.check)(payload)
    }
}

impl fmt::Debug for CompiledValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledValidator")
            .field("message", &self.message)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Compile a validator for `message_name` without caching
pub fn compile<R: MessageResolver + ?Sized>(
    resolver: &R,
    message_name: &str,
    options: ValidationOptions,
) -> CompiledValidator {
    match resolver.resolve(message_name) {
        Ok(schema) => {
            debug!(message = message_name, "compiled validator");
            CompiledValidator::for_schema(message_name, schema, options)
        }
        Err(resolution) => {
            match &resolution {
                Resolution::NotFound { suggestion, .. } => {
                    debug!(message = message_name, ?suggestion, "message not found");
                }
                Resolution::NoSchema { reference, .. } => {
                    warn!(message = message_name, %reference, "message payload does not resolve");
                }
            }
            CompiledValidator::failing(message_name, resolution.into_error())
        }
    }
}

/// Compiles validators on demand and caches them by message name.
///
/// Entries are written at most once per name and read many times, so the
/// cache sits behind a read-write lock: lookups only take the read side.
pub struct ValidatorCompiler<R: MessageResolver> {
    resolver: Arc<R>,
    options: ValidationOptions,
    cache: RwLock<HashMap<String, CompiledValidator>>,
}

impl<R: MessageResolver> ValidatorCompiler<R> {
    pub fn new(resolver: R) -> Self {
        Self::from_shared(Arc::new(resolver))
    }

    pub fn from_shared(resolver: Arc<R>) -> Self {
        Self {
            resolver,
            options: ValidationOptions::default(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the options used by validators compiled from now on
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self.cache.get_mut().clear();
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    /// Compile a fresh validator, bypassing the cache
    pub fn compile(&self, message_name: &str) -> CompiledValidator {
        compile(self.resolver.as_ref(), message_name, self.options)
    }

    /// Cached validator for `message_name`, compiling it on first use
    pub fn get(&self, message_name: &str) -> CompiledValidator {
        if let Some(hit) = self.cache.read().get(message_name) {
            return hit.clone();
        }

        let compiled = self.compile(message_name);
        // Another thread may have won the race; keep whichever landed first.
        self.cache
            .write()
            .entry(message_name.to_string())
            .or_insert(compiled)
            .clone()
    }

    /// Validate one payload against the named message
    pub fn validate(&self, message_name: &str, payload: &Value) -> ValidationOutcome {
        self.get(message_name).validate(payload)
    }

    /// Warm the cache for a set of messages, returning the validators in order
    pub fn precompile<'a, I>(&self, message_names: I) -> Vec<CompiledValidator>
    where
        I: IntoIterator<Item = &'a str>,
    {
        message_names.into_iter().map(|name| self.get(name)).collect()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }
}

impl<R: MessageResolver> fmt::Debug for ValidatorCompiler<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorCompiler")
            .field("options", &self.options)
            .field("cached", &self.cached_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SchemaCatalog;
    use crate::schema::Message;
    use crate::violation::Constraint;
    use serde_json::json;

    fn compiler() -> ValidatorCompiler<SchemaCatalog> {
        let mut catalog = SchemaCatalog::new();
        catalog
            .add_schema(
                "Order",
                SchemaNode::object()
                    .required("id")
                    .property("id", SchemaNode::string().min_length(1)),
            )
            .unwrap();
        catalog
            .add_message(Message::new("order.placed", "#/components/schemas/Order"))
            .unwrap();
        catalog
            .add_message(Message::new("order.lost", "#/components/schemas/Nope"))
            .unwrap();
        ValidatorCompiler::new(catalog)
    }

    #[test]
    fn test_compiled_validator_checks_payloads() {
        let compiler = compiler();
        let validator = compiler.compile("order.placed");
        assert!(validator.is_resolved());
        assert_eq!(validator.validate(&json!({"id": "o-1"})), Ok(()));
        let errors = validator.validate(&json!({})).unwrap_err();
        assert_eq!(errors[0].constraint, Constraint::Required);
    }

    #[test]
    fn test_unknown_message_compiles_to_not_found() {
        let validator = compiler().compile("ghost");
        assert!(!validator.is_resolved());
        let errors = validator.validate(&json!({"anything": true})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].constraint, Constraint::NotFound);
        assert!(errors[0].path.is_empty());
    }

    #[test]
    fn test_dangling_reference_compiles_to_no_schema() {
        let errors = compiler().validate("order.lost", &json!({})).unwrap_err();
        assert_eq!(errors[0].constraint, Constraint::NoSchema);
    }

    #[test]
    fn test_cache_shares_validators() {
        let compiler = compiler();
        let first = compiler.get("order.placed");
        let second = compiler.get("order.placed");
        assert!(Arc::ptr_eq(&first.check, &second.check));
        assert_eq!(compiler.cached_count(), 1);

        compiler.precompile(["order.lost", "ghost"]);
        assert_eq!(compiler.cached_count(), 3);

        compiler.clear_cache();
        assert_eq!(compiler.cached_count(), 0);
    }

    #[test]
    fn test_options_flow_into_validators() {
        let compiler = compiler().with_options(ValidationOptions { max_depth: 0 });
        let errors = compiler
            .validate("order.placed", &json!({"id": "x"}))
            .unwrap_err();
        assert_eq!(errors[0].constraint, Constraint::Internal);
    }

    #[test]
    fn test_validators_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledValidator>();
        assert_send_sync::<ValidatorCompiler<SchemaCatalog>>();
    }
}
