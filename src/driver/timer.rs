use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::EnginePoller;
use crate::error::DriverError;

pub struct TimerDriver {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TimerDriver {
    pub const UNITS_PER_SECOND: f64 = 1000.0;

    pub fn start(mut poller: EnginePoller, interval: Duration) -> Result<Self, DriverError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = std::thread::Builder::new()
            .name("tempolock-timer".into())
            .spawn(move || {
                let origin = Instant::now();
                while !stop_flag.load(Ordering::Acquire) {
                    poller.poll(origin.elapsed().as_secs_f64() * Self::UNITS_PER_SECOND);
                    std::thread::sleep(interval);
                }
            })?;

        tracing::info!("timer clock driver running every {:?}", interval);

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
