//! Work-unit lifecycle status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle position of a work unit. Variants are ordered; comparisons such as
/// `status >= Status::Downloading` follow the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    /// Fresh slot with no assignment.
    #[default]
    Created,
    /// Requesting an assignment from the server.
    Initializing,
    /// Assignment received but not yet downloading.
    Defined,
    /// Fetching input files.
    Downloading,
    /// Inputs ready; waiting for the compute slot.
    Waiting,
    /// Application computation in progress.
    Computing,
    /// Computation done; waiting for the upload slot.
    Finished,
    /// Sending result files.
    Uploading,
    /// Reported (or about to be reported) to the server.
    Completed,
    /// Reading state back from disk.
    Loading,
    /// Upload gave up; reported to the server as a failure.
    Failed,
}

impl Status {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 11] = [
        Self::Created,
        Self::Initializing,
        Self::Defined,
        Self::Downloading,
        Self::Waiting,
        Self::Computing,
        Self::Finished,
        Self::Uploading,
        Self::Completed,
        Self::Loading,
        Self::Failed,
    ];

    /// Marker label written to disk, or `None` for transient statuses.
    pub const fn label(self) -> Option<&'static str> {
        match self {
            Self::Downloading => Some("DOWNLOADING"),
            Self::Waiting => Some("WAITING"),
            Self::Computing => Some("COMPUTING"),
            Self::Finished => Some("FINISHED"),
            Self::Uploading => Some("UPLOADING"),
            Self::Completed => Some("COMPLETED"),
            _ => None,
        }
    }

    /// Whether the status survives a restart.
    pub const fn is_storable(self) -> bool {
        self.label().is_some()
    }

    /// Slot is busy fetching an assignment or its inputs.
    pub const fn is_downloading(self) -> bool {
        matches!(
            self,
            Self::Initializing | Self::Defined | Self::Downloading | Self::Waiting
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Returned when a marker label is not one of the storable labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status label `{}`", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label() == Some(label))
            .ok_or_else(|| UnknownStatus(label.to_string()))
    }
}
