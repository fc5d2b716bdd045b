//! Builder assembling a [`Scheduler`] from its collaborators.

use std::sync::Arc;

use crate::config::{SchedulerConfig, SharedConfiguration};
use crate::core::{ClientError, ClientResult, ComputeExecutor, ErrorCode, Proxy, Scheduler, StatusListener};
use crate::util::clock::{Clock, SystemClock};

/// Step-by-step construction of a [`Scheduler`].
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new()
///     .with_configuration(config)
///     .with_proxy(HttpProxy::new(config.clone())?)
///     .with_compute(ThreadCompute::spawn(run_job)?)
///     .with_listener(|slot| println!("slot {slot} changed"))
///     .build()?;
/// ```
pub struct SchedulerBuilder<P, C> {
    settings: SchedulerConfig,
    config: Option<SharedConfiguration>,
    proxy: Option<P>,
    compute: Option<C>,
    clock: Arc<dyn Clock>,
    listener: Option<Arc<dyn StatusListener>>,
}

impl<P, C> Default for SchedulerBuilder<P, C>
where
    P: Proxy,
    C: ComputeExecutor,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C> SchedulerBuilder<P, C>
where
    P: Proxy,
    C: ComputeExecutor,
{
    /// Builder with default settings and the system clock.
    pub fn new() -> Self {
        Self {
            settings: SchedulerConfig::default(),
            config: None,
            proxy: None,
            compute: None,
            clock: Arc::new(SystemClock),
            listener: None,
        }
    }

    /// Slot count and retry timings.
    #[must_use]
    pub fn with_settings(mut self, settings: SchedulerConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Parameter store shared with the proxy.
    #[must_use]
    pub fn with_configuration(mut self, config: SharedConfiguration) -> Self {
        self.config = Some(config);
        self
    }

    /// Server proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy: P) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Compute executor.
    #[must_use]
    pub fn with_compute(mut self, compute: C) -> Self {
        self.compute = Some(compute);
        self
    }

    /// Time source, e.g. a manual clock in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Status listener installed before the first event.
    #[must_use]
    pub fn with_listener(mut self, listener: impl StatusListener) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Validate settings and assemble the scheduler.
    pub fn build(self) -> ClientResult<Scheduler<P, C>> {
        let missing = |what: &str| ClientError::fatal(ErrorCode::Internal, format!("scheduler builder: missing {what}"));
        let config = self.config.ok_or_else(|| missing("configuration"))?;
        let proxy = self.proxy.ok_or_else(|| missing("proxy"))?;
        let compute = self.compute.ok_or_else(|| missing("compute executor"))?;

        let scheduler = Scheduler::from_parts(self.settings, config, proxy, compute, self.clock)?;
        if let Some(listener) = self.listener {
            scheduler.set_shared_status_listener(listener);
        }
        Ok(scheduler)
    }
}
