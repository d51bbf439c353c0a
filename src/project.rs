use crossbeam::channel::Sender;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ProjectError;
use crate::notes::Note;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteFile {
    #[serde(default)]
    pub loop_length: Option<f64>,
    pub notes: Vec<Note>,
}

impl NoteFile {
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&content).map_err(|source| ProjectError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, content).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Watches the parent directory, so editors that save by replacing the file
/// keep being picked up.
pub struct NoteFileWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl NoteFileWatcher {
    pub fn spawn(path: &Path, tx: Sender<NoteFile>) -> Result<Self, ProjectError> {
        let path = path.to_path_buf();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path.file_name().map(|n| n.to_os_string());
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !ours {
                        return;
                    }
                    match NoteFile::load(&watched) {
                        Ok(file) => {
                            tracing::info!("reloaded {}", watched.display());
                            let _ = tx.send(file);
                        }
                        Err(e) => tracing::warn!("keeping previous notes: {}", e),
                    }
                }
                Err(e) => tracing::warn!("watch error: {}", e),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!("watching {}", path.display());

        Ok(Self {
            _watcher: watcher,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
