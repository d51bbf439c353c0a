use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::DriverError;
use crate::events::ClockMessage;
use crate::timing::{MAX_BPM, MIN_BPM, PPQ};
use crate::transport::ClockInput;

/// Fixed-tempo pulse source. Sends Start when spawned and Stop when dropped.
pub struct InternalClock {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    bpm: f64,
}

impl InternalClock {
    pub fn spawn(input: ClockInput, bpm: f64) -> Result<Self, DriverError> {
        let bpm = if bpm.is_finite() {
            bpm.clamp(MIN_BPM, MAX_BPM)
        } else {
            return Err(DriverError::Unavailable(format!("invalid tempo {bpm}")));
        };
        let period = Duration::from_secs_f64(60.0 / (bpm * PPQ as f64));
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = std::thread::Builder::new()
            .name("tempolock-internal-clock".into())
            .spawn(move || {
                input.handle(ClockMessage::Start);
                // Deadlines advance by whole periods so sleep overshoot does
                // not accumulate into tempo drift.
                let mut deadline = Instant::now() + period;
                while !stop_flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    }
                    input.handle(ClockMessage::Tick);
                    deadline += period;
                }
                input.handle(ClockMessage::Stop);
            })?;

        tracing::info!("internal clock running at {} bpm", bpm);

        Ok(Self {
            stop,
            handle: Some(handle),
            bpm,
        })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }
}

impl Drop for InternalClock {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
