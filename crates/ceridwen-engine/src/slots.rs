//! Bounded admission of concurrent orchestration passes.
//!
//! An explicit semaphore object rather than a process-global counter:
//! permits are RAII guards, so a slot is returned on every exit path,
//! including panics and early returns on step failure.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Pool of run slots. Cloneable; clones share the same pool.
#[derive(Clone)]
pub struct RunSlots {
    semaphore: Arc<Semaphore>,
}

/// Held for the duration of one start/resume pass.
pub struct RunPermit {
    _permit: OwnedSemaphorePermit,
}

impl RunSlots {
    pub fn new(slots: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(slots)),
        }
    }

    /// Take a slot without waiting. `None` when all slots are occupied.
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| RunPermit { _permit: permit })
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permits_are_scoped() {
        let slots = RunSlots::new(1);
        assert_eq!(slots.available(), 1);

        let permit = slots.try_acquire().unwrap();
        assert_eq!(slots.available(), 0);
        assert!(slots.try_acquire().is_none());

        drop(permit);
        assert_eq!(slots.available(), 1);
        assert!(slots.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_pool() {
        let slots = RunSlots::new(2);
        let other = slots.clone();
        let _a = slots.try_acquire().unwrap();
        let _b = other.try_acquire().unwrap();
        assert!(slots.try_acquire().is_none());
        assert!(other.try_acquire().is_none());
    }
}
