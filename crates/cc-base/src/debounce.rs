//! Timer-reset-on-input primitive.
//!
//! Every [`Debouncer::push`] restarts the quiet window and bumps a revision.
//! Once the window has elapsed, [`Debouncer::poll`] hands out the settled value
//! together with its revision; a result computed for that value is only kept
//! while [`Debouncer::is_latest`] still holds, so a later keystroke invalidates
//! a request already in flight without cancelling it.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
    revision: u64,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None, revision: 0 }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a new value at `now`; returns its revision.
    pub fn push(&mut self, value: T, now: Instant) -> u64 {
        self.revision += 1;
        self.pending = Some((value, now + self.delay));
        self.revision
    }

    /// Take the pending value if its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<(u64, T)> {
        let due = matches!(&self.pending, Some((_, deadline)) if *deadline <= now);
        if !due {
            return None;
        }
        let (value, _) = self.pending.take()?;
        Some((self.revision, value))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, d)| *d)
    }

    pub fn is_latest(&self, revision: u64) -> bool {
        self.pending.is_none() && revision == self.revision
    }

    /// Drop the pending value and invalidate anything in flight.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(1000);

    #[test]
    fn fires_only_after_quiet_window() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.push("a", t0);
        assert!(d.poll(t0 + Duration::from_millis(999)).is_none());
        assert_eq!(d.poll(t0 + DELAY), Some((1, "a")));
        assert!(d.poll(t0 + DELAY * 2).is_none());
    }

    #[test]
    fn keystroke_resets_window_and_keeps_last_value() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.push("a", t0);
        d.push("ab", t0 + Duration::from_millis(600));
        assert!(d.poll(t0 + DELAY).is_none());
        assert_eq!(d.poll(t0 + Duration::from_millis(1600)), Some((2, "ab")));
    }

    #[test]
    fn new_input_invalidates_fired_revision() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.push("a", t0);
        let (rev, _) = d.poll(t0 + DELAY).expect("fired");
        assert!(d.is_latest(rev));
        d.push("ab", t0 + DELAY);
        assert!(!d.is_latest(rev));
    }

    #[test]
    fn cancel_invalidates() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.push("a", t0);
        let (rev, _) = d.poll(t0 + DELAY).expect("fired");
        d.cancel();
        assert!(!d.is_latest(rev));
        assert!(d.deadline().is_none());
    }
}
