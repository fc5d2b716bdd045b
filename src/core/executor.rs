//! Application-side hooks: computing a work unit and observing status changes.

use super::error::ClientResult;
use super::scheduler::SchedulerHandle;
use super::workunit::WorkUnit;

/// Runs the application computation for a work unit.
///
/// The scheduler calls [`ComputeExecutor::compute`] once a slot reaches `Computing` and
/// does not wait for the result. The executor owns the rest of the phase: it may
/// compute inline or hand the work to its own thread or task, and it must eventually
/// call [`SchedulerHandle::change_work_unit_status`] with `Status::Finished` (or
/// `Status::Failed`) for the slot.
///
/// # Example
///
/// ```rust,ignore
/// use grid_client::core::{ClientResult, ComputeExecutor, SchedulerHandle, Status, WorkUnit};
///
/// struct Inline;
///
/// impl ComputeExecutor for Inline {
///     fn compute(&self, handle: SchedulerHandle, wu: WorkUnit) -> ClientResult<()> {
///         // ... produce the result files in wu.working_dir() ...
///         handle.change_work_unit_status(wu.slot(), Status::Finished)
///     }
/// }
/// ```
pub trait ComputeExecutor: Send + Sync + 'static {
    /// Start computing `workunit`. An error is attached to the slot and the compute
    /// event is retried after the error's delay.
    fn compute(&self, handle: SchedulerHandle, workunit: WorkUnit) -> ClientResult<()>;
}

/// Observer notified whenever a slot's status, progress, or error changes.
///
/// Notifications are delivered after the scheduler lock is released, so
/// implementations may call back into the scheduler.
pub trait StatusListener: Send + Sync + 'static {
    /// Slot `slot` changed.
    fn status_changed(&self, slot: usize);
}

impl<F> StatusListener for F
where
    F: Fn(usize) + Send + Sync + 'static,
{
    fn status_changed(&self, slot: usize) {
        self(slot);
    }
}
