use std::sync::atomic::{AtomicU64, Ordering};

/// Cheap unique ids for chat turns: a random per-process seed mixed with a
/// sequence number, so no RNG call is needed per request.
pub(crate) struct TurnIdGenerator {
    seed: u128,
    sequence: AtomicU64,
}

impl TurnIdGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        let high = u128::from(fastrand::u64(..));
        let low = u128::from(fastrand::u64(..));
        Self {
            seed: (high << 64) | low,
            sequence: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_id(&self) -> uuid::Uuid {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        uuid::Uuid::from_u128(self.seed ^ u128::from(sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct() {
        let ids = TurnIdGenerator::new();
        let first = ids.next_id();
        let second = ids.next_id();
        assert_ne!(first, second);
        assert_eq!(first.as_u128() ^ second.as_u128(), 1 ^ 2);
    }
}
