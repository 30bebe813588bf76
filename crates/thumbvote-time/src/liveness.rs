//! Liveness generations
//!
//! Every pending asynchronous continuation (engine load, camera acquisition,
//! delayed tally/cooldown tasks) captures the generation that was current when
//! it was scheduled. Teardown bumps the generation; a continuation holding an
//! older generation must not touch shared state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of a liveness token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

/// Shared liveness token
///
/// Clones observe the same generation counter.
#[derive(Clone, Debug, Default)]
pub struct Liveness {
    current: Arc<AtomicU64>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation to capture when scheduling a continuation
    pub fn generation(&self) -> Generation {
        Generation(self.current.load(Ordering::Acquire))
    }

    /// Is `generation` still the live one?
    pub fn is_live(&self, generation: Generation) -> bool {
        self.generation() == generation
    }

    /// Invalidate every outstanding continuation
    pub fn invalidate(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_makes_old_generation_stale() {
        let liveness = Liveness::new();
        let captured = liveness.generation();
        assert!(liveness.is_live(captured));

        let next = liveness.invalidate();
        assert!(!liveness.is_live(captured));
        assert!(liveness.is_live(next));
    }

    #[test]
    fn test_clones_share_counter() {
        let liveness = Liveness::new();
        let held_by_task = liveness.clone();
        let captured = held_by_task.generation();

        liveness.invalidate();
        assert!(!held_by_task.is_live(captured));
    }
}
