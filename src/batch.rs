//! Batch validation
//!
//! Applies one validator to many independent payloads. Each payload's outcome
//! depends on nothing but that payload, so large batches fan out across the
//! rayon pool; the output is always in input order, one entry per payload.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::compiler::{CompiledValidator, ValidatorCompiler};
use crate::resolver::MessageResolver;
use crate::violation::ValidationOutcome;

/// Default batch size at which validation goes parallel
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// `(index, outcome)` pairs, index `i` describing `payloads[i]`
pub type BatchOutcome = Vec<(usize, ValidationOutcome)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Batches at least this long are validated on the rayon pool
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_parallel_threshold() -> usize {
    DEFAULT_PARALLEL_THRESHOLD
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// Validate every payload with a precompiled validator
pub fn validate_batch_with(
    validator: &CompiledValidator,
    payloads: &[Value],
    options: &BatchOptions,
) -> BatchOutcome {
    if payloads.len() >= options.parallel_threshold.max(1) {
        debug!(message = validator.message(), size = payloads.len(), "parallel batch");
        payloads
            .par_iter()
            .enumerate()
            .map(|(index, payload)| (index, validator.validate(payload)))
            .collect()
    } else {
        payloads
            .iter()
            .enumerate()
            .map(|(index, payload)| (index, validator.validate(payload)))
            .collect()
    }
}

/// Validate every payload against the named message.
///
/// Resolution happens once; an unresolvable name yields the same
/// `NotFound` / `NoSchema` error for every payload.
pub fn validate_batch<R: MessageResolver>(
    compiler: &ValidatorCompiler<R>,
    message_name: &str,
    payloads: &[Value],
    options: &BatchOptions,
) -> BatchOutcome {
    let validator = compiler.get(message_name);
    validate_batch_with(&validator, payloads, options)
}

/// Count of payloads that passed
pub fn passed(outcome: &BatchOutcome) -> usize {
    outcome.iter().filter(|(_, result)| result.is_ok()).count()
}
