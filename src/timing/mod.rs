mod activation;
mod channel;
mod engine;
mod position;
mod reconcile;
mod tempo;

pub use activation::{ActiveNote, NoteActivationEngine};
pub use channel::{Command, TICK_COUNTER_CEILING, TimingChannel};
pub use engine::{ClockEngine, EngineSnapshot};
pub use position::{PositionStep, PositionTracker, TickDelta};
pub use reconcile::NoteSetReconciler;
pub use tempo::{DEFAULT_BPM, DEFAULT_SMOOTHING, MAX_BPM, MIN_BPM, PPQ, TempoEstimator};
