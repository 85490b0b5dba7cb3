//! Optimizer configuration.
//!
//! These limits prevent runaway optimization for pathologically large queries.
//! `max_iterations` bounds the number of fixpoint passes; `max_memo_groups`
//! bounds memo growth. Exceeding either is reported as a recoverable error
//! carrying the best plan found so far.

use serde::{Deserialize, Deserializer};

pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_MAX_MEMO_GROUPS: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Upper bound on the number of passes, the final no-change pass included.
    #[serde(deserialize_with = "at_least_one")]
    pub max_iterations: usize,
    /// Upper bound on the number of groups the memo may contain.
    pub max_memo_groups: usize,
    /// Optional connector/source type name used to select connector-specific rules.
    pub source_type: Option<String>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_memo_groups: DEFAULT_MAX_MEMO_GROUPS,
            source_type: None,
        }
    }
}

impl OptimizerConfig {
    /// Zero is clamped to one pass.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_max_memo_groups(mut self, max_memo_groups: usize) -> Self {
        self.max_memo_groups = max_memo_groups;
        self
    }

    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }
}

fn at_least_one<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    Ok(usize::deserialize(deserializer)?.max(1))
}
