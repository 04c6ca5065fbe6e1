use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Error returned when a file's metadata cannot be read.
#[derive(Debug, Error)]
pub enum StatError {
    /// The file does not exist.
    #[error("file '{}' was not found", .0.display())]
    NotFound(PathBuf),
    /// The path exists but is not a regular file.
    #[error("'{}' is not a regular file", .0.display())]
    NotRegular(PathBuf),
    /// Any other I/O failure while reading metadata.
    #[error("failed to stat '{}': {source}", .path.display())]
    Io {
        /// Path whose metadata was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Metadata triple both sides of the DFS use for synchronisation decisions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FileStat {
    /// Modification time in seconds since the Unix epoch.
    pub mtime: i64,
    /// Change time in seconds since the Unix epoch.
    pub ctime: i64,
    /// File size in bytes.
    pub size: u64,
}

impl FileStat {
    /// Reads the stat triple for a regular file.
    pub fn read(path: &Path) -> Result<Self, StatError> {
        let metadata = std::fs::metadata(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StatError::NotFound(path.to_path_buf())
            } else {
                StatError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        if !metadata.is_file() {
            return Err(StatError::NotRegular(path.to_path_buf()));
        }
        Ok(Self::from_metadata(&metadata))
    }

    /// Reads the stat triple, mapping a missing file to `None`.
    pub fn read_if_exists(path: &Path) -> Result<Option<Self>, StatError> {
        match Self::read(path) {
            Ok(stat) => Ok(Some(stat)),
            Err(StatError::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    pub(crate) fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            mtime: unix_seconds(metadata.modified()),
            ctime: change_time(metadata),
            size: metadata.len(),
        }
    }
}

fn unix_seconds(time: io::Result<SystemTime>) -> i64 {
    let Ok(time) = time else { return 0 };
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
        Err(before_epoch) => -i64::try_from(before_epoch.duration().as_secs()).unwrap_or(i64::MAX),
    }
}

#[cfg(unix)]
fn change_time(metadata: &Metadata) -> i64 {
    use std::os::unix::fs::MetadataExt;

    metadata.ctime()
}

#[cfg(not(unix))]
fn change_time(metadata: &Metadata) -> i64 {
    unix_seconds(metadata.modified())
}
