//! Message resolution
//!
//! Maps a message name to the schema its payload must satisfy. The validator
//! core only talks to the [`MessageResolver`] trait; [`SchemaCatalog`] is the
//! in-memory implementation produced by the loader.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};
use crate::schema::{Message, PayloadRef, SchemaNode};
use crate::violation::ValidationError;

/// Why a message could not be resolved to a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No message with this name
    NotFound {
        message: String,
        suggestion: Option<String>,
    },
    /// The message exists but its payload reference dangles
    NoSchema { message: String, reference: String },
}

impl Resolution {
    /// The uniform error shape callers receive
    pub fn into_error(self) -> ValidationError {
        match self {
            Resolution::NotFound { message, suggestion } => {
                ValidationError::not_found(&message, suggestion.as_deref())
            }
            Resolution::NoSchema { message, reference } => {
                ValidationError::no_schema(&message, &reference)
            }
        }
    }
}

/// Source of messages and schemas
pub trait MessageResolver: Send + Sync {
    /// Look up a message by name
    fn message(&self, name: &str) -> Option<&Message>;

    /// Look up a component schema by name
    fn schema(&self, name: &str) -> Option<Arc<SchemaNode>>;

    /// Closest known message name, used to enrich `NotFound`
    fn suggest(&self, _name: &str) -> Option<String> {
        None
    }

    /// Resolve a message name to its payload schema
    fn resolve(&self, message_name: &str) -> std::result::Result<Arc<SchemaNode>, Resolution> {
        let message = self.message(message_name).ok_or_else(|| Resolution::NotFound {
            message: message_name.to_string(),
            suggestion: self.suggest(message_name),
        })?;

        match &message.payload {
            PayloadRef::Inline(schema) => Ok(Arc::clone(schema)),
            PayloadRef::Named(name) => self.schema(name).ok_or_else(|| Resolution::NoSchema {
                message: message_name.to_string(),
                reference: message.payload.to_string(),
            }),
        }
    }
}

/// In-memory catalog of component schemas and messages
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: HashMap<String, Arc<SchemaNode>>,
    messages: HashMap<String, Message>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component schema; names are unique
    pub fn add_schema(&mut self, name: impl Into<String>, schema: SchemaNode) -> Result<()> {
        let name = name.into();
        if self.schemas.contains_key(&name) {
            return Err(SchemaError::AlreadyExists(name));
        }
        self.schemas.insert(name, Arc::new(schema));
        Ok(())
    }

    /// Register a message; names are unique
    pub fn add_message(&mut self, message: Message) -> Result<()> {
        if self.messages.contains_key(&message.name) {
            return Err(SchemaError::AlreadyExists(message.name));
        }
        self.messages.insert(message.name.clone(), message);
        Ok(())
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Message names, sorted
    pub fn message_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.messages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Schema names, sorted
    pub fn schema_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Messages whose payload reference does not resolve
    pub fn dangling_messages(&self) -> Vec<&Message> {
        let mut dangling: Vec<&Message> = self
            .messages
            .values()
            .filter(|m| match &m.payload {
                PayloadRef::Named(name) => !self.schemas.contains_key(name),
                PayloadRef::Inline(_) => false,
            })
            .collect();
        dangling.sort_by(|a, b| a.name.cmp(&b.name));
        dangling
    }

    /// Content fingerprint, independent of insertion order
    pub fn fingerprint(&self) -> Checksum {
        #[derive(Serialize)]
        struct Canonical<'a> {
            schemas: BTreeMap<&'a String, &'a Arc<SchemaNode>>,
            messages: BTreeMap<&'a String, &'a Message>,
        }

        Checksum::from_serializable(&Canonical {
            schemas: self.schemas.iter().collect(),
            messages: self.messages.iter().collect(),
        })
    }
}

impl MessageResolver for SchemaCatalog {
    fn message(&self, name: &str) -> Option<&Message> {
        self.messages.get(name)
    }

    fn schema(&self, name: &str) -> Option<Arc<SchemaNode>> {
        self.schemas.get(name).cloned()
    }

    fn suggest(&self, name: &str) -> Option<String> {
        let matcher = SkimMatcherV2::default();
        let mut best: Option<(i64, &str)> = None;

        for candidate in self.messages.keys() {
            // Match both ways so typos and truncations both find something
            let score = matcher
                .fuzzy_match(candidate, name)
                .into_iter()
                .chain(matcher.fuzzy_match(name, candidate))
                .max();
            if let Some(score) = score {
                let better = match best {
                    Some((top, top_name)) => {
                        score > top || (score == top && candidate.as_str() < top_name)
                    }
                    None => true,
                };
                if better {
                    best = Some((score, candidate.as_str()));
                }
            }
        }

        best.map(|(_, name)| name.to_string())
    }
}

impl<R: MessageResolver + ?Sized> MessageResolver for Arc<R> {
    fn message(&self, name: &str) -> Option<&Message> {
        (**self).message(name)
    }

    fn schema(&self, name: &str) -> Option<Arc<SchemaNode>> {
        (**self).schema(name)
    }

    fn suggest(&self, name: &str) -> Option<String> {
        (**self).suggest(name)
    }

    fn resolve(&self, message_name: &str) -> std::result::Result<Arc<SchemaNode>, Resolution> {
        (**self).resolve(message_name)
    }
}
