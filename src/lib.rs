pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod midi;
pub mod notes;
pub mod project;
pub mod sink;
pub mod timing;
pub mod transport;

pub use config::{DriverKind, SyncConfig, TimeUnit};
pub use events::{ClockEvent, ClockMessage, EventWriter};
pub use notes::{Note, NoteList};
pub use project::{NoteFile, NoteFileWatcher};
pub use sink::{NoteSink, NullSink};
pub use timing::{ClockEngine, EngineSnapshot, PPQ};
pub use transport::{ClockInput, Observers, TransportController};
