//! Process-wide order identifier allocator shared by every table.
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocatorError {
    /// The 64-bit id space is used up. The counter never wraps.
    #[error("identifier space exhausted")]
    Exhausted,
}

/// Strictly increasing, globally unique ids starting at 1.
///
/// ```
/// use bistro_actors::ids::IdAllocator;
///
/// let ids = IdAllocator::new();
/// assert_eq!(ids.next_id().unwrap(), 1);
/// assert_eq!(ids.next_id().unwrap(), 2);
/// assert_eq!(ids.peek(), 3);
/// ```
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> Result<u64, AllocatorError> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map_err(|_| AllocatorError::Exhausted)
    }

    /// The id the next successful call would return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Whether `id` has already been handed out by this allocator.
    pub fn issued(&self, id: u64) -> bool {
        id != 0 && id < self.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn refuses_to_wrap() {
        let ids = IdAllocator::starting_at(u64::MAX - 1);
        assert_eq!(ids.next_id(), Ok(u64::MAX - 1));
        assert_eq!(ids.next_id(), Err(AllocatorError::Exhausted));
        assert_eq!(ids.next_id(), Err(AllocatorError::Exhausted));
        assert_eq!(ids.peek(), u64::MAX);
    }

    #[test]
    fn issued_tracks_handed_out_ids() {
        let ids = IdAllocator::new();
        assert!(!ids.issued(1));
        ids.next_id().unwrap();
        assert!(ids.issued(1));
        assert!(!ids.issued(0));
        assert!(!ids.issued(2));
    }

    #[test]
    fn concurrent_callers_never_collide() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        let ids = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| ids.next_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            let seen = h.join().unwrap();
            assert!(seen.windows(2).all(|w| w[0] < w[1]), "per-caller order must increase");
            all.extend(seen);
        }
        assert_eq!(all.len(), THREADS * PER_THREAD);
        assert_eq!(ids.peek(), (THREADS * PER_THREAD) as u64 + 1);
    }
}
