//! Gapless back-to-back scheduling of synthesized audio fragments.

use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    pub id: SourceId,
    pub start_at: f64,
    pub duration: f64,
}

/// Tracks where the next fragment starts and which sources are still live.
///
/// Times are seconds on the output clock.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start: f64,
    next_id: u64,
    active: BTreeSet<SourceId>,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, id: SourceId) -> bool {
        self.active.contains(&id)
    }

    /// `start = max(next_start, now)`, then `next_start = start + duration`.
    pub fn schedule(&mut self, duration: f64, now: f64) -> ScheduledSource {
        let start_at = self.next_start.max(now);
        self.next_start = start_at + duration.max(0.0);

        let id = SourceId(self.next_id);
        self.next_id += 1;
        self.active.insert(id);

        ScheduledSource {
            id,
            start_at,
            duration,
        }
    }

    /// Returns false when the source was already gone (finished or interrupted).
    pub fn finish(&mut self, id: SourceId) -> bool {
        self.active.remove(&id)
    }

    /// Forgets every tracked source and rewinds the cursor to zero.
    /// The caller must stop the returned sources on the output.
    pub fn interrupt(&mut self) -> Vec<SourceId> {
        self.next_start = 0.0;
        std::mem::take(&mut self.active).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn back_to_back_when_clock_lags() {
        let mut s = PlaybackScheduler::new();
        let a = s.schedule(0.5, 0.0);
        let b = s.schedule(0.25, 0.1);
        let c = s.schedule(1.0, 0.2);

        assert_abs_diff_eq!(a.start_at, 0.0);
        assert_abs_diff_eq!(b.start_at, 0.5);
        assert_abs_diff_eq!(c.start_at, 0.75);
        assert_abs_diff_eq!(s.next_start_time(), 1.75);
        assert_eq!(s.active_count(), 3);
    }

    #[test]
    fn clock_overtaking_moves_start_forward() {
        let mut s = PlaybackScheduler::new();
        s.schedule(0.5, 0.0);
        let late = s.schedule(0.5, 2.0);
        assert_abs_diff_eq!(late.start_at, 2.0);
        assert_abs_diff_eq!(s.next_start_time(), 2.5);
    }

    #[test]
    fn start_times_never_decrease() {
        let mut s = PlaybackScheduler::new();
        let mut last = f64::MIN;
        let nows = [0.0, 0.01, 3.0, 1.0, 3.2, 0.0, 10.0];
        for (i, now) in nows.iter().enumerate() {
            let src = s.schedule(0.1 * (i as f64 + 1.0), *now);
            assert!(src.start_at >= last);
            last = src.start_at;
        }
    }

    #[test]
    fn interrupt_returns_all_and_resets() {
        let mut s = PlaybackScheduler::new();
        let a = s.schedule(1.0, 0.0);
        let b = s.schedule(1.0, 0.0);
        assert!(s.finish(a.id));
        assert!(!s.finish(a.id));

        let stopped = s.interrupt();
        assert_eq!(stopped, vec![b.id]);
        assert_eq!(s.active_count(), 0);
        assert_abs_diff_eq!(s.next_start_time(), 0.0);

        let c = s.schedule(1.0, 5.0);
        assert_abs_diff_eq!(c.start_at, 5.0);
        assert_ne!(c.id, b.id);
    }
}
