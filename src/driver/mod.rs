//! Execution contexts that drive the clock engine.

mod audio;
mod internal;
mod timer;

pub use audio::AudioDriver;
pub use internal::InternalClock;
pub use timer::TimerDriver;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::DriverKind;
use crate::events::EventQueue;
use crate::notes::NoteList;
use crate::timing::{ClockEngine, EngineSnapshot, TimingChannel};

pub struct EnginePoller {
    engine: ClockEngine,
    channel: Arc<TimingChannel>,
    notes: Arc<ArcSwap<NoteList>>,
    queue: EventQueue,
    snapshot: Arc<Mutex<EngineSnapshot>>,
}

impl EnginePoller {
    pub fn new(
        engine: ClockEngine,
        channel: Arc<TimingChannel>,
        notes: Arc<ArcSwap<NoteList>>,
        queue: EventQueue,
        snapshot: Arc<Mutex<EngineSnapshot>>,
    ) -> Self {
        Self {
            engine,
            channel,
            notes,
            queue,
            snapshot,
        }
    }

    pub fn engine(&self) -> &ClockEngine {
        &self.engine
    }

    pub fn poll(&mut self, now: f64) {
        self.engine
            .poll(&self.channel, &self.notes, now, &mut self.queue);
        // Never wait on the control side; a contended publish is skipped.
        if let Some(mut slot) = self.snapshot.try_lock() {
            *slot = self.engine.snapshot();
        }
    }
}

pub enum Driver {
    Audio(AudioDriver),
    Timer(TimerDriver),
}

impl Driver {
    pub fn kind(&self) -> DriverKind {
        match self {
            Driver::Audio(_) => DriverKind::Audio,
            Driver::Timer(_) => DriverKind::Timer,
        }
    }
}
