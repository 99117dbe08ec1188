//! Error handling types and utilities.

use std::path::{Path, PathBuf};

/// A specialized Result type for application-level operations.
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` methods in the CLI and config layers.
pub type Result<T> = anyhow::Result<T>;

/// Error returned when a fragment document cannot be loaded.
///
/// Records inside a readable fragment are never reported here; unusable
/// records are skipped and counted by the loader instead.
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    /// Fragment file not found at the expected path.
    #[error("Fragment not found at {}", .path.display())]
    NotFound { path: PathBuf },
    /// Fragment file exists but could not be read.
    #[error("Failed to read fragment {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Fragment contents are not a valid fragment document.
    #[error("Failed to parse fragment {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FragmentError {
    /// Path of the fragment that failed to load.
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path } | Self::Read { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}
