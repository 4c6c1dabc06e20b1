//! Primary-key identifiers: generation and parsing.

use crate::error::StoreError;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of fresh primary keys for records inserted without one.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Uuid;
}

/// Random v4 ids. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic ids (`00000000-0000-0000-0000-000000000001`, ...). Handy in tests and demos.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(n as u128)
    }
}

pub fn parse_id(text: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(text.trim()).map_err(|_| StoreError::MalformedId(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_id("not-a-uuid"), Err(StoreError::MalformedId(_))));
        let id = RandomIds.generate();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn sequential_ids_count_from_one() {
        let ids = SequentialIds::default();
        assert_eq!(ids.generate(), Uuid::from_u128(1));
        assert_eq!(ids.generate(), Uuid::from_u128(2));
    }
}
