//! Core scheduling abstractions: work units, events, retry policy and the scheduler.

pub mod error;
pub mod event;
pub mod executor;
pub mod proxy;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod workunit;

pub use error::{AppResult, ClientError, ClientResult, ErrorCode, Severity};
pub use event::{Event, EventKind};
pub use executor::{ComputeExecutor, StatusListener};
pub use proxy::{Progress, Proxy};
pub use retry::{backoff, linear_backoff, RetryPolicy};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use status::{Status, UnknownStatus};
pub use workunit::{
    is_plain_file_name, App, FileArena, FileFlags, FileId, FileInfo, Manifest, WorkResult,
    WorkUnit, WorkUnitStatus,
};
