use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Highest rating a table can give.
pub const MAX_STARS: u8 = 5;

/// Stars for a service that took `elapsed` against a promised `max_wait`.
///
/// Within the promise earns full marks; each further tenth over it costs a
/// star, down to zero at forty percent late.
///
/// ```
/// use bistro_actors::rating::stars_for;
/// use std::time::Duration;
///
/// let max_wait = Duration::from_millis(100);
/// assert_eq!(stars_for(Duration::from_millis(90), max_wait), 5);
/// assert_eq!(stars_for(Duration::from_millis(125), max_wait), 2);
/// assert_eq!(stars_for(Duration::from_millis(500), max_wait), 0);
/// ```
pub fn stars_for(elapsed: Duration, max_wait: Duration) -> u8 {
    if max_wait.is_zero() {
        return if elapsed.is_zero() { MAX_STARS } else { 0 };
    }
    let ratio = elapsed.as_secs_f64() / max_wait.as_secs_f64();
    match ratio {
        r if r <= 1.0 => 5,
        r if r <= 1.1 => 4,
        r if r <= 1.2 => 3,
        r if r <= 1.3 => 2,
        r if r <= 1.4 => 1,
        _ => 0,
    }
}

/// Hall-wide rating aggregator shared by every table.
///
/// Lock-free: `rate` may be called from any number of tables at once.
#[derive(Debug, Default)]
pub struct RatingSystem {
    total: AtomicU64,
    count: AtomicU64,
}

impl RatingSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one rating; values above [`MAX_STARS`] are clamped.
    pub fn rate(&self, stars: u8) {
        let stars = stars.min(MAX_STARS);
        self.total.fetch_add(u64::from(stars), Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Release);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Mean rating so far, `None` before the first one.
    pub fn average(&self) -> Option<f64> {
        let count = self.count.load(Ordering::Acquire);
        if count == 0 {
            return None;
        }
        let total = self.total.load(Ordering::Relaxed);
        Some(total as f64 / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn average_is_none_until_rated() {
        let r = RatingSystem::new();
        assert_eq!(r.average(), None);
        r.rate(5);
        r.rate(2);
        assert_eq!(r.count(), 2);
        assert_eq!(r.average(), Some(3.5));
    }

    #[test]
    fn out_of_range_ratings_are_clamped() {
        let r = RatingSystem::new();
        r.rate(200);
        assert_eq!(r.average(), Some(f64::from(MAX_STARS)));
    }

    #[test]
    fn zero_promise_only_rewards_instant_service() {
        assert_eq!(stars_for(Duration::ZERO, Duration::ZERO), 5);
        assert_eq!(stars_for(Duration::from_millis(1), Duration::ZERO), 0);
    }

    #[test]
    fn boundaries() {
        let w = Duration::from_millis(1000);
        assert_eq!(stars_for(Duration::from_millis(1000), w), 5);
        assert_eq!(stars_for(Duration::from_millis(1100), w), 4);
        assert_eq!(stars_for(Duration::from_millis(1150), w), 3);
        assert_eq!(stars_for(Duration::from_millis(1400), w), 1);
        assert_eq!(stars_for(Duration::from_millis(1401), w), 0);
    }

    #[test]
    fn concurrent_ratings_are_all_counted() {
        let r = Arc::new(RatingSystem::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = r.clone();
                std::thread::spawn(move || (0..250).for_each(|_| r.rate(4)))
            })
            .collect();
        handles.into_iter().for_each(|h| h.join().unwrap());
        assert_eq!(r.count(), 1000);
        assert_eq!(r.average(), Some(4.0));
    }
}
