use crate::error::ChunkError;
use crate::types::{Sample, Value};
use serde::{Deserialize, Serialize};

/// Resolution strategy for an upsert that lands on an existing timestamp.
/// Serde: lowercase string (e.g. `"block"`, `"last"`), so a host config layer
/// can parse the policy straight from its config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Reject the incoming sample.
    #[default]
    Block,
    /// Keep the stored value.
    First,
    /// Last write wins.
    Last,
    /// Numeric minimum of both values.
    Min,
    /// Numeric maximum of both values.
    Max,
    /// IEEE-754 addition of both values.
    Sum,
}

impl DuplicatePolicy {
    /// Resolves a timestamp collision. Pure function of the two samples,
    /// invoked exactly once per upsert that hits an existing timestamp.
    /// Returns the value to store, or `DuplicateSample` when the policy
    /// rejects the write.
    pub fn resolve(self, existing: Sample, incoming: Sample) -> Result<Value, ChunkError> {
        debug_assert_eq!(existing.timestamp, incoming.timestamp);
        match self {
            DuplicatePolicy::Block => Err(ChunkError::DuplicateSample(existing.timestamp)),
            DuplicatePolicy::First => Ok(existing.value),
            DuplicatePolicy::Last => Ok(incoming.value),
            DuplicatePolicy::Min => Ok(nan_preserving(existing.value, incoming.value, f64::min)),
            DuplicatePolicy::Max => Ok(nan_preserving(existing.value, incoming.value, f64::max)),
            DuplicatePolicy::Sum => Ok(existing.value + incoming.value),
        }
    }
}

// f64::min/max drop NaN in favor of the other operand; min/max policies keep
// NaN poisonous instead, matching the sum policy's propagation.
fn nan_preserving(a: Value, b: Value, pick: fn(f64, f64) -> f64) -> Value {
    if a.is_nan() || b.is_nan() {
        Value::NAN
    } else {
        pick(a, b)
    }
}
