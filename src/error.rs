//! Error types shared by the library modules.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while enumerating a directory level.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The source became unreadable (permission revoked, handle invalidated).
    /// Whatever was collected before the failure is discarded.
    #[error("cannot read {}: {source}", path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    pub fn access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ScanError::Access {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to create watcher: {0}")]
    Create(#[source] notify::Error),
    #[error("failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("failed to spawn watcher thread: {0}")]
    Spawn(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to spawn memory sampler: {0}")]
    Spawn(#[source] io::Error),
}
