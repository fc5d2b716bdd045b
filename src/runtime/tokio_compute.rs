//! Compute executor running async jobs on a tokio runtime.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use super::report_outcome;
use crate::core::{ClientError, ClientResult, ComputeExecutor, ErrorCode, SchedulerHandle, WorkUnit};

/// Spawns `job(workunit)` on a tokio runtime and reports the outcome when it resolves.
pub struct TokioCompute<F> {
    handle: tokio::runtime::Handle,
    job: Arc<F>,
}

impl<F> std::fmt::Debug for TokioCompute<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioCompute").finish_non_exhaustive()
    }
}

impl<F, Fut> TokioCompute<F>
where
    F: Fn(WorkUnit) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ClientResult<()>> + Send + 'static,
{
    /// Executor spawning onto `handle`.
    pub fn new(handle: tokio::runtime::Handle, job: F) -> Self {
        Self {
            handle,
            job: Arc::new(job),
        }
    }

    /// Executor spawning onto the runtime of the caller.
    pub fn current(job: F) -> ClientResult<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            ClientError::fatal(ErrorCode::Internal, format!("no tokio runtime: {e}"))
        })?;
        Ok(Self::new(handle, job))
    }
}

impl<F, Fut> ComputeExecutor for TokioCompute<F>
where
    F: Fn(WorkUnit) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ClientResult<()>> + Send + 'static,
{
    fn compute(&self, scheduler: SchedulerHandle, workunit: WorkUnit) -> ClientResult<()> {
        let slot = workunit.slot();
        let job = Arc::clone(&self.job);
        self.handle.spawn(async move {
            debug!(slot, "compute task started");
            let outcome = job(workunit).await;
            report_outcome(&scheduler, slot, outcome);
        });
        Ok(())
    }
}
