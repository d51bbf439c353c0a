//! Tempo estimation from clock pulse arrival times. Timestamps are in the
//! driving context's own unit; `units_per_second` converts them.

/// Pulses per quarter note of a MIDI clock.
pub const PPQ: u32 = 24;
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;
pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_SMOOTHING: f64 = 0.1;

const WINDOW: usize = PPQ as usize;

pub struct TempoEstimator {
    units_per_second: f64,
    smoothing: f64,
    smoothed_bpm: f64,
    times: [f64; WINDOW],
    index: usize,
    count: usize,
    last_time: Option<f64>,
}

impl TempoEstimator {
    pub fn new(units_per_second: f64, smoothing: f64, initial_bpm: f64) -> Self {
        Self {
            units_per_second,
            smoothing: if smoothing.is_finite() {
                smoothing.clamp(0.0, 1.0)
            } else {
                DEFAULT_SMOOTHING
            },
            smoothed_bpm: if !initial_bpm.is_finite() {
                DEFAULT_BPM
            } else {
                initial_bpm.clamp(MIN_BPM, MAX_BPM)
            },
            times: [0.0; WINDOW],
            index: 0,
            count: 0,
            last_time: None,
        }
    }

    pub fn bpm(&self) -> f64 {
        self.smoothed_bpm
    }

    pub fn is_window_full(&self) -> bool {
        self.count >= WINDOW
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.count = 0;
        self.last_time = None;
    }

    pub fn resync(&mut self, now: f64) {
        self.reset();
        self.push(now);
        self.last_time = Some(now);
    }

    /// Coalesced pulses are spread evenly over the elapsed interval.
    pub fn observe(&mut self, ticks: u32, now: f64) -> f64 {
        if ticks == 0 || !now.is_finite() {
            return self.smoothed_bpm;
        }
        let Some(last) = self.last_time else {
            self.push(now);
            self.last_time = Some(now);
            return self.smoothed_bpm;
        };
        let elapsed = now - last;
        if elapsed <= 0.0 {
            return self.smoothed_bpm;
        }

        let per_tick = elapsed / ticks as f64;
        let first = ticks.saturating_sub(WINDOW as u32) + 1;
        for i in first..=ticks {
            self.push(last + per_tick * i as f64);
        }
        self.last_time = Some(now);

        if self.is_window_full() {
            let newest = self.times[(self.index + WINDOW - 1) % WINDOW];
            let oldest = self.times[self.index];
            let average = (newest - oldest) / (WINDOW - 1) as f64;
            if let Some(measured) = self.interval_to_bpm(average) {
                self.smoothed_bpm += self.smoothing * (measured - self.smoothed_bpm);
            }
        } else if let Some(measured) = self.interval_to_bpm(per_tick) {
            self.smoothed_bpm = measured;
        }

        self.smoothed_bpm
    }

    fn push(&mut self, time: f64) {
        self.times[self.index] = time;
        self.index = (self.index + 1) % WINDOW;
        if self.count < WINDOW {
            self.count += 1;
        }
    }

    fn interval_to_bpm(&self, interval: f64) -> Option<f64> {
        if interval <= 0.0 {
            return None;
        }
        let bpm = (self.units_per_second * 60.0) / (interval * PPQ as f64);
        (bpm.is_finite() && (MIN_BPM..=MAX_BPM).contains(&bpm)).then_some(bpm)
    }
}
