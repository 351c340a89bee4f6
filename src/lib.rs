//! Familiar Conformance
//!
//! Runtime message conformance for the Familiar platform: checks that dynamic
//! payloads match the schema registered for their message type, and seeds test
//! suites with conforming and deliberately broken payloads.
//!
//! ## Features
//!
//! - **Exhaustive Reporting**: Every violation is reported with its path, not just the first
//! - **Compiled Validators**: Message lookup happens once; validators are cached and shared
//! - **Parallel Batches**: Large batches fan out across a thread pool, results stay in order
//! - **Example Generation**: Deterministic examples and counter-examples per schema
//! - **Catalog Loading**: JSON-Schema subset documents with local `$ref`s and cycle detection
//!
//! ## Architecture
//!
//! ```text
//! catalog.json ──loader──► SchemaCatalog (MessageResolver)
//!                                │
//!                     ValidatorCompiler ──cache──► CompiledValidator
//!                                │                        │
//!                          validate_batch            validate(payload)
//!                                                         │
//!                                               Ok(()) | Err(Vec<ValidationError>)
//! ```

pub mod batch;
pub mod checksum;
pub mod compiler;
pub mod config;
pub mod error;
pub mod generator;
pub mod loader;
pub mod resolver;
pub mod schema;
pub mod validator;
pub mod value;
pub mod violation;

pub use batch::{validate_batch, validate_batch_with, BatchOptions, BatchOutcome};
pub use checksum::Checksum;
pub use compiler::{CompiledValidator, ValidatorCompiler};
pub use config::ConformanceConfig;
pub use error::{Result, SchemaError};
pub use generator::{generate_example, generate_negative_cases, ExampleGenerator, NegativeCase};
pub use loader::{load_catalog, load_catalog_str, parse_schema};
pub use resolver::{MessageResolver, Resolution, SchemaCatalog};
pub use schema::{Message, PayloadRef, SchemaKind, SchemaNode};
pub use validator::{validate, validate_at, validate_with, ValidationOptions};
pub use value::ValueKind;
pub use violation::{Constraint, PathSegment, ValidationError, ValidationOutcome};
