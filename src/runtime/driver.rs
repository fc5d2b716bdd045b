//! Loop driving the scheduler until cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::core::{ClientResult, ComputeExecutor, Proxy, Scheduler};

/// Cancellation flag shared between the loop and whoever stops it.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// A flag that is not yet raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop after the current event.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handle ready events until `shutdown` is raised, sleeping `idle` whenever nothing
/// is due. A fatal error stops the loop and is returned; other errors are logged
/// and the affected events have already been rescheduled by the scheduler.
pub async fn run<P, C>(
    scheduler: &Scheduler<P, C>,
    shutdown: &ShutdownFlag,
    idle: Duration,
) -> ClientResult<()>
where
    P: Proxy,
    C: ComputeExecutor,
{
    info!("scheduler loop started");
    while !shutdown.is_cancelled() {
        if !scheduler.has_events() {
            tokio::time::sleep(idle).await;
            continue;
        }
        match scheduler.handle_events().await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                error!("scheduler stopped: {}", e);
                return Err(e);
            }
            Err(e) => debug!("event failed and was rescheduled: {e}"),
        }
    }
    info!("scheduler loop cancelled");
    Ok(())
}
