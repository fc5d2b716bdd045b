//! Runtime glue: the driving loop, Ctrl-C handling and compute executors.

#[cfg(feature = "tokio-runtime")]
pub mod driver;
#[cfg(feature = "tokio-runtime")]
pub mod signal;
#[cfg(not(target_arch = "wasm32"))]
pub mod thread_compute;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_compute;

#[cfg(feature = "tokio-runtime")]
pub use driver::{run, ShutdownFlag};
#[cfg(feature = "tokio-runtime")]
pub use signal::install_ctrl_c;
#[cfg(not(target_arch = "wasm32"))]
pub use thread_compute::ThreadCompute;
#[cfg(feature = "tokio-runtime")]
pub use tokio_compute::TokioCompute;

use tracing::warn;

use crate::core::{ClientResult, SchedulerHandle, Status};

/// Report the outcome of a computation: `Finished` on success, otherwise the error
/// is attached to the slot and the work unit is failed.
pub fn report_outcome(handle: &SchedulerHandle, slot: usize, outcome: ClientResult<()>) {
    let status = match outcome {
        Ok(()) => Status::Finished,
        Err(error) => {
            if let Err(e) = handle.set_work_unit_error(slot, error) {
                warn!("slot {} cannot record compute error: {}", slot, e);
            }
            Status::Failed
        }
    };
    if let Err(e) = handle.change_work_unit_status(slot, status) {
        warn!("slot {} cannot report {}: {}", slot, status, e);
    }
}
