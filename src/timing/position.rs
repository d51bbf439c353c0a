use super::tempo::PPQ;
use crate::config::TimeUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDelta {
    Idle,
    Advance(u32),
    Discontinuity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionStep {
    pub previous: f64,
    pub current: f64,
    pub loop_length: f64,
}

impl PositionStep {
    pub fn is_wrapping(&self) -> bool {
        self.loop_length > 0.0 && self.current < self.previous
    }
}

/// Integrates tick deltas into a cumulative timeline position.
///
/// The position is accumulated from per-batch increments converted with the
/// tempo current at that batch, never recomputed as `ticks * period`, so
/// tempo drift does not rewrite the past.
pub struct PositionTracker {
    unit: TimeUnit,
    threshold: u32,
    last_tick_count: u32,
    cumulative: f64,
    loop_length: f64,
    previous: f64,
}

impl PositionTracker {
    pub fn new(unit: TimeUnit, discontinuity_threshold: u32) -> Self {
        Self {
            unit,
            threshold: discontinuity_threshold,
            last_tick_count: 0,
            cumulative: 0.0,
            loop_length: 0.0,
            previous: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.last_tick_count = 0;
        self.rewind();
    }

    pub fn rewind(&mut self) {
        self.cumulative = 0.0;
        self.previous = 0.0;
    }

    pub fn cumulative(&self) -> f64 {
        self.cumulative
    }

    pub fn loop_length(&self) -> f64 {
        self.loop_length
    }

    /// Changes the loop length, rebasing the previous position so the change
    /// itself is not mistaken for a wrap.
    pub fn set_loop_length(&mut self, loop_length: f64) {
        self.loop_length = if loop_length.is_finite() && loop_length > 0.0 {
            loop_length
        } else {
            0.0
        };
        self.previous = self.position();
    }

    pub fn position(&self) -> f64 {
        if self.loop_length > 0.0 {
            self.cumulative % self.loop_length
        } else {
            self.cumulative
        }
    }

    pub fn delta(&mut self, tick_count: u32) -> TickDelta {
        let delta = tick_count as i64 - self.last_tick_count as i64;
        if delta == 0 {
            return TickDelta::Idle;
        }
        self.last_tick_count = tick_count;
        if delta < 0 || delta > self.threshold as i64 {
            return TickDelta::Discontinuity;
        }
        TickDelta::Advance(delta as u32)
    }

    pub fn advance(&mut self, ticks: u32, bpm: f64) -> PositionStep {
        let per_tick = match self.unit {
            TimeUnit::Seconds => 60.0 / (bpm * PPQ as f64),
            TimeUnit::Beats => 1.0 / PPQ as f64,
        };
        self.cumulative += ticks as f64 * per_tick;

        let step = PositionStep {
            previous: self.previous,
            current: self.position(),
            loop_length: self.loop_length,
        };
        self.previous = step.current;
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_tempo() {
        let mut tracker = PositionTracker::new(TimeUnit::Seconds, 100);
        assert_eq!(tracker.delta(24), TickDelta::Advance(24));
        let step = tracker.advance(24, 120.0);
        assert!((step.current - 0.5).abs() < 1e-12);
        assert_eq!(step.previous, 0.0);
        assert!(!step.is_wrapping());
    }

    #[test]
    fn beats_ignore_tempo() {
        let mut tracker = PositionTracker::new(TimeUnit::Beats, 100);
        let step = tracker.advance(48, 73.0);
        assert!((step.current - 2.0).abs() < 1e-12);
    }

    #[test]
    fn wraps_at_loop_length() {
        let mut tracker = PositionTracker::new(TimeUnit::Beats, 100);
        tracker.set_loop_length(1.0);
        tracker.advance(20, 120.0);
        let step = tracker.advance(8, 120.0);
        assert!(step.is_wrapping());
        assert!((step.current - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn discontinuities_resync_without_moving() {
        let mut tracker = PositionTracker::new(TimeUnit::Seconds, 100);
        assert_eq!(tracker.delta(10), TickDelta::Advance(10));
        assert_eq!(tracker.delta(5), TickDelta::Discontinuity);
        assert_eq!(tracker.delta(505), TickDelta::Discontinuity);
        assert_eq!(tracker.delta(506), TickDelta::Advance(1));
        assert_eq!(tracker.delta(506), TickDelta::Idle);
        assert_eq!(tracker.cumulative(), 0.0);
    }

    #[test]
    fn shrinking_loop_is_not_a_wrap() {
        let mut tracker = PositionTracker::new(TimeUnit::Beats, 100);
        tracker.set_loop_length(4.0);
        tracker.advance(72, 120.0);
        tracker.set_loop_length(2.0);
        let step = tracker.advance(1, 120.0);
        assert!(!step.is_wrapping());
    }
}
