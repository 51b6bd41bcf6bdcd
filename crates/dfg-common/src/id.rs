//! Expectation identity types.
//!
//! Every recorded expectation receives an id exactly once, when the recorder
//! creates it. The id stays stable across verification runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identity of a recorded expectation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectationId(pub String);

impl ExpectationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExpectationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExpectationId {
    fn from(s: &str) -> Self {
        ExpectationId(s.to_string())
    }
}

/// Source of fresh expectation ids.
pub trait IdProvider: Send {
    /// Return an id that was never handed out before.
    fn new_id(&self) -> ExpectationId;
}

/// Random v4 UUIDs, the production provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn new_id(&self) -> ExpectationId {
        ExpectationId(uuid::Uuid::new_v4().to_string())
    }
}

/// Deterministic ids (`<prefix>-1`, `<prefix>-2`, ...) for tests and replays.
#[derive(Debug)]
pub struct SequentialIdProvider {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdProvider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIdProvider {
    fn default() -> Self {
        Self::new("exp")
    }
}

impl IdProvider for SequentialIdProvider {
    fn new_id(&self) -> ExpectationId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        ExpectationId(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_provider_yields_distinct_ids() {
        let provider = UuidProvider;
        let ids: HashSet<_> = (0..100).map(|_| provider.new_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_sequential_provider_counts_from_one() {
        let provider = SequentialIdProvider::new("t");
        assert_eq!(provider.new_id().as_str(), "t-1");
        assert_eq!(provider.new_id().as_str(), "t-2");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = ExpectationId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
