//! Compute executor backed by a dedicated OS thread.
//!
//! Blocking, CPU-bound application code runs on its own thread so it never stalls the
//! async runtime driving the scheduler. Jobs are fed through a bounded
//! `crossbeam-channel`; dropping the executor closes the channel and the thread exits
//! once the job in hand is done.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::report_outcome;
use crate::config::MAX_SLOTS;
use crate::core::{ClientError, ClientResult, ComputeExecutor, ErrorCode, SchedulerHandle, WorkUnit};

type Job = Arc<dyn Fn(&WorkUnit) -> ClientResult<()> + Send + Sync>;

/// Delay suggested to the scheduler when the worker queue is full.
const BUSY_DELAY_SECS: u64 = 5;

/// Runs a blocking job per work unit on a named worker thread.
pub struct ThreadCompute {
    sender: Mutex<Option<Sender<(SchedulerHandle, WorkUnit)>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ThreadCompute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadCompute")
            .field("running", &self.sender.lock().is_some())
            .finish()
    }
}

impl ThreadCompute {
    /// Start the worker thread running `job` for each work unit handed over.
    pub fn spawn<F>(job: F) -> ClientResult<Self>
    where
        F: Fn(&WorkUnit) -> ClientResult<()> + Send + Sync + 'static,
    {
        let job: Job = Arc::new(job);
        let (tx, rx) = bounded::<(SchedulerHandle, WorkUnit)>(MAX_SLOTS);
        let worker = thread::Builder::new()
            .name("grid-compute".into())
            .spawn(move || {
                debug!("compute thread started");
                while let Ok((scheduler, workunit)) = rx.recv() {
                    let slot = workunit.slot();
                    debug!(slot, "compute job started");
                    let outcome = job(&workunit);
                    report_outcome(&scheduler, slot, outcome);
                }
                debug!("compute channel closed, exiting");
            })
            .map_err(|e| {
                ClientError::fatal(ErrorCode::System, format!("cannot spawn compute thread: {e}"))
            })?;
        info!("compute thread spawned");
        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Close the job channel and wait for the worker to finish its current job.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("compute thread panicked");
            }
        }
    }
}

impl ComputeExecutor for ThreadCompute {
    fn compute(&self, scheduler: SchedulerHandle, workunit: WorkUnit) -> ClientResult<()> {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(ClientError::error(ErrorCode::Internal, "compute thread is shut down"));
        };
        match sender.try_send((scheduler, workunit)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ClientError::delayed(
                ErrorCode::Internal,
                "compute thread is busy",
                BUSY_DELAY_SECS,
            )),
            Err(TrySendError::Disconnected(_)) => {
                Err(ClientError::error(ErrorCode::Internal, "compute thread has exited"))
            }
        }
    }
}

impl Drop for ThreadCompute {
    fn drop(&mut self) {
        // Workers are not joined on drop.
        self.sender.lock().take();
    }
}
