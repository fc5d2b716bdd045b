//! File-backed status marker for one slot.
//!
//! The marker holds a single storable status label. Writes go to a hidden temp file
//! first and are renamed over the marker, so a crash never leaves a truncated label.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::{ClientError, ClientResult, ErrorCode, Status};
use crate::util::fs::write_atomic;

/// Marker filename inside a slot directory.
pub const STATUS_FILE: &str = "workunit.status";
/// Temp filename used while replacing the marker.
pub const STATUS_TEMP_FILE: &str = ".workunit.status";

/// Status marker of one slot directory.
#[derive(Debug, Clone)]
pub struct StatusFile {
    dir: PathBuf,
}

impl StatusFile {
    /// Marker for the slot stored in `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the marker file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(STATUS_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(STATUS_TEMP_FILE)
    }

    /// Read the persisted status. A missing marker yields `None`; an unreadable or
    /// unknown label is a filesystem error.
    pub fn read(&self) -> ClientResult<Option<Status>> {
        let path = self.path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ClientError::error(
                    ErrorCode::FileSystem,
                    format!("cannot read {}: {e}", path.display()),
                ))
            }
        };
        raw.parse::<Status>().map(Some).map_err(|e| {
            ClientError::error(ErrorCode::FileSystem, format!("{}: {e}", path.display()))
        })
    }

    /// Persist `status`. Transient statuses are not written.
    pub fn write(&self, status: Status) -> ClientResult<()> {
        let Some(label) = status.label() else {
            return Ok(());
        };
        debug!(dir = %self.dir.display(), label, "persisting status");
        write_atomic(&self.path(), &self.temp_path(), label).map_err(|e| {
            ClientError::error(
                ErrorCode::FileSystem,
                format!("cannot store status in {}: {e}", self.dir.display()),
            )
        })
    }
}
