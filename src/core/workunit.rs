//! Work-unit record: assignment manifest plus the mutable runtime state of one slot.
//!
//! File descriptors live in a [`FileArena`] owned by the manifest. Context lists
//! (work-unit inputs, application files, result outputs) hold [`FileId`] handles into
//! the arena, and `<file_ref>` names are resolved through the arena's name index.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ClientError, ClientResult, ErrorCode, Severity};
use super::status::Status;
use crate::util::fs::md5_file;

/// Per-file flags from the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFlags {
    /// File must be made executable after download.
    pub executable: bool,
    /// File is produced by the computation, never downloaded.
    pub generated_locally: bool,
    /// File is sent back to the server when present.
    pub upload: bool,
    /// File is the application entry point.
    pub main_program: bool,
}

/// Descriptor for one file of an assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Protocol name of the file.
    pub name: String,
    /// Name used on disk, when it differs from `name`.
    pub open_name: Option<String>,
    /// Download or upload URL.
    pub url: Option<String>,
    /// Hex MD5 of the expected content.
    pub checksum: Option<String>,
    /// Server file signature blob.
    pub signature: Option<String>,
    /// Server XML signature blob, echoed back on upload.
    pub xml_signature: Option<String>,
    /// Declared size in bytes.
    pub nbytes: u64,
    /// Maximum accepted size in bytes.
    pub max_nbytes: u64,
    /// Behaviour flags.
    pub flags: FileFlags,
}

impl FileInfo {
    /// Descriptor with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Filename used inside the working directory.
    pub fn disk_name(&self) -> &str {
        match self.open_name.as_deref() {
            Some(open) if !open.is_empty() => open,
            _ => &self.name,
        }
    }

    /// Both names stay inside the working directory they are joined to.
    pub fn has_plain_names(&self) -> bool {
        is_plain_file_name(&self.name) && self.open_name.as_deref().map_or(true, is_plain_file_name)
    }
}

/// A single relative path component: no root, no `..`, no `.`.
pub fn is_plain_file_name(name: &str) -> bool {
    let mut parts = Path::new(name).components();
    matches!(parts.next(), Some(Component::Normal(_))) && parts.next().is_none()
}

/// Stable handle to a [`FileInfo`] inside a [`FileArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(usize);

/// Owning pool of every file descriptor seen while parsing an assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileArena {
    files: Vec<FileInfo>,
    by_name: HashMap<String, FileId>,
}

impl FileArena {
    /// Add a descriptor. A later descriptor with the same name shadows earlier ones.
    pub fn insert(&mut self, file: FileInfo) -> FileId {
        let id = FileId(self.files.len());
        self.by_name.insert(file.name.clone(), id);
        self.files.push(file);
        id
    }

    /// Resolve a `<file_ref>` name.
    pub fn resolve(&self, name: &str) -> Option<FileId> {
        self.by_name.get(name).copied()
    }

    /// Resolve a name or fail with a parse error.
    pub fn require(&self, name: &str) -> ClientResult<FileId> {
        self.resolve(name).ok_or_else(|| {
            ClientError::error(ErrorCode::Server, format!("unresolved file reference `{name}`"))
        })
    }

    /// Borrow a descriptor.
    pub fn get(&self, id: FileId) -> Option<&FileInfo> {
        self.files.get(id.0)
    }

    /// Mutably borrow a descriptor.
    pub fn get_mut(&mut self, id: FileId) -> Option<&mut FileInfo> {
        self.files.get_mut(id.0)
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the arena holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over all descriptors.
    pub fn iter(&self) -> impl Iterator<Item = (FileId, &FileInfo)> {
        self.files.iter().enumerate().map(|(i, f)| (FileId(i), f))
    }
}

/// Application version that processes the work unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct App {
    /// Application name.
    pub name: Option<String>,
    /// Version number as sent by the server.
    pub version: Option<String>,
    /// Client API version.
    pub api_version: Option<String>,
    /// Application files.
    pub files: Vec<FileId>,
}

/// Result instance the client must produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkResult {
    /// Result name.
    pub name: Option<String>,
    /// Report deadline, seconds since the epoch.
    pub deadline: u64,
    /// Output files.
    pub files: Vec<FileId>,
    /// Accumulated compute time in seconds.
    pub cpu_time: u64,
}

/// Parsed assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// Work-unit name.
    pub name: Option<String>,
    /// Estimated floating point operations.
    pub estimated_flops: f64,
    /// Memory bound in bytes.
    pub estimated_memory: f64,
    /// Disk bound in bytes.
    pub estimated_disk: f64,
    /// Application version.
    pub app: App,
    /// Result to produce.
    pub result: WorkResult,
    /// Work-unit input files.
    pub files: Vec<FileId>,
    /// Every descriptor of the assignment.
    pub arena: FileArena,
}

impl Manifest {
    /// Borrow a descriptor by handle.
    pub fn file(&self, id: FileId) -> Option<&FileInfo> {
        self.arena.get(id)
    }

    /// Work-unit inputs to fetch, skipping generated ones. Application files are
    /// provided by the embedding application and never downloaded.
    pub fn input_files(&self) -> Vec<FileId> {
        self.files
            .iter()
            .copied()
            .filter(|id| self.arena.get(*id).is_some_and(|f| !f.flags.generated_locally))
            .collect()
    }

    /// Result files flagged both generated-locally and upload.
    pub fn output_files(&self) -> Vec<FileId> {
        self.result
            .files
            .iter()
            .copied()
            .filter(|id| {
                self.arena
                    .get(*id)
                    .is_some_and(|f| f.flags.generated_locally && f.flags.upload)
            })
            .collect()
    }
}

/// Read-only status view for the embedding application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkUnitStatus {
    /// Current status.
    pub status: Status,
    /// Progress of the current phase, 0 to 100.
    pub progress: f32,
    /// Pending retry delay in seconds.
    pub delay: u64,
    /// Severity of the last error, if any.
    pub error_severity: Option<Severity>,
    /// Code of the last error, if any.
    pub error_code: Option<ErrorCode>,
    /// Message of the last error, if any.
    pub error_message: Option<String>,
}

/// One slot's assignment and runtime state.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    slot: usize,
    working_dir: PathBuf,
    /// Parsed assignment; empty until the server hands one out.
    pub manifest: Manifest,
    status: Status,
    progress: f32,
    delay: u64,
    error: Option<ClientError>,
    status_changed_at: u64,
    compute_started_at: Option<u64>,
}

impl WorkUnit {
    /// Create a fresh work unit, creating its working directory if absent.
    pub fn create(slot: usize, working_dir: impl Into<PathBuf>, now: u64) -> ClientResult<Self> {
        let working_dir = working_dir.into();
        fs::create_dir_all(&working_dir).map_err(|e| {
            ClientError::fatal(
                ErrorCode::FileSystem,
                format!("cannot create {}: {e}", working_dir.display()),
            )
        })?;
        Ok(Self {
            slot,
            working_dir,
            manifest: Manifest::default(),
            status: Status::Created,
            progress: 0.0,
            delay: 0,
            error: None,
            status_changed_at: now,
            compute_started_at: None,
        })
    }

    /// Slot index owning this work unit.
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Directory holding this work unit's files.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Work-unit name, once assigned.
    pub fn name(&self) -> Option<&str> {
        self.manifest.name.as_deref()
    }

    /// Current status.
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Time of the last real status change, seconds since the epoch.
    pub const fn status_changed_at(&self) -> u64 {
        self.status_changed_at
    }

    /// Change status. Returns `true` only if the status actually changed, in which
    /// case progress is reset and the change time recorded.
    pub fn set_status(&mut self, status: Status, now: u64) -> bool {
        if self.status == status {
            return false;
        }
        debug!(slot = self.slot, from = %self.status, to = %status, "work unit status change");
        self.status = status;
        self.progress = 0.0;
        self.status_changed_at = now;
        true
    }

    /// Progress of the current phase.
    pub const fn progress(&self) -> f32 {
        self.progress
    }

    /// Set progress, clamped to 0..=100.
    pub fn set_progress(&mut self, progress: f32) {
        self.progress = progress.clamp(0.0, 100.0);
    }

    /// Pending retry delay.
    pub const fn delay(&self) -> u64 {
        self.delay
    }

    /// Record the scheduled retry delay.
    pub fn set_delay(&mut self, delay: u64) {
        self.delay = delay;
    }

    /// Last error, if any.
    pub const fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    /// Attach an error for status reporting.
    pub fn set_error(&mut self, error: ClientError) {
        self.error = Some(error);
    }

    /// Forget the last error and delay.
    pub fn clear_error(&mut self) {
        self.error = None;
        self.delay = 0;
    }

    /// Mark the start of computation.
    pub fn start_compute(&mut self, now: u64) {
        self.compute_started_at = Some(now);
    }

    /// Fold elapsed compute time into the result.
    pub fn finish_compute(&mut self, now: u64) {
        if let Some(started) = self.compute_started_at.take() {
            self.manifest.result.cpu_time += now.saturating_sub(started);
        }
    }

    /// Install a freshly parsed assignment.
    pub fn install(&mut self, manifest: Manifest) {
        self.manifest = manifest;
    }

    /// Snapshot for polling.
    pub fn snapshot(&self) -> WorkUnitStatus {
        WorkUnitStatus {
            status: self.status,
            progress: self.progress,
            delay: self.delay,
            error_severity: self.error.as_ref().map(ClientError::severity),
            error_code: self.error.as_ref().map(ClientError::code),
            error_message: self.error.as_ref().map(|e| e.message().to_string()),
        }
    }

    /// Path of a file inside the working directory.
    pub fn file_path(&self, file: &FileInfo) -> PathBuf {
        self.working_dir.join(file.disk_name())
    }

    /// Whether a file must be fetched: absent, no checksum to compare, or content mismatch.
    pub fn file_needs_download(&self, file: &FileInfo) -> bool {
        let path = self.file_path(file);
        if !path.exists() {
            return true;
        }
        let Some(expected) = file.checksum.as_deref().filter(|c| !c.is_empty()) else {
            return true;
        };
        match md5_file(&path) {
            Ok(actual) => !actual.eq_ignore_ascii_case(expected.trim()),
            Err(_) => true,
        }
    }
}
