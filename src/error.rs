use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to access note file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid note file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("failed to serialize note file: {0}")]
    Serialize(#[from] ron::Error),
    #[error("failed to watch note file: {0}")]
    Watch(#[from] notify::Error),
}

#[derive(Debug, Error)]
pub enum DriverError {
    /// Callers fall back to another driver.
    #[error("clock driver unavailable: {0}")]
    Unavailable(String),
    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("failed to spawn clock thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("output is not connected")]
    Disconnected,
    #[error("failed to send MIDI message: {0}")]
    Send(String),
}

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("failed to initialise MIDI: {0}")]
    Init(#[from] midir::InitError),
    #[error("no MIDI port matching {0:?}")]
    PortNotFound(Option<String>),
    #[error("failed to connect to MIDI port: {0}")]
    Connect(String),
}
