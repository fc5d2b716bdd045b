//! Event-driven work-unit scheduler.
//!
//! The scheduler owns a fixed number of slots and a time-ordered event queue. Each
//! call to [`Scheduler::handle_events`] takes one ready event and advances its slot
//! through the lifecycle:
//!
//! ```text
//! Created -> Initializing -> Downloading -> Waiting -> Computing
//!         -> Finished -> Uploading -> Completed -> erase -> Created
//!                                 \-> Failed ----^
//! ```
//!
//! The slot table and the queue share one `parking_lot::Mutex`. The lock is taken
//! only for in-memory mutation and marker writes; proxy I/O and the compute hand-off
//! run unlocked, and listeners are notified after the lock is released.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::error::{ClientError, ClientResult, ErrorCode};
use super::event::{Event, EventKind};
use super::executor::{ComputeExecutor, StatusListener};
use super::proxy::Proxy;
use super::retry::{self, RetryPolicy};
use super::status::Status;
use super::workunit::{FileInfo, WorkUnit, WorkUnitStatus};
use crate::config::{Parameter, SchedulerConfig, SharedConfiguration};
use crate::infra::queue::EventQueue;
use crate::infra::status_file::StatusFile;
use crate::util::clock::{Clock, SystemClock};
use crate::util::fs::remove_dir_if_exists;

/// Slot table and event queue, guarded together.
struct SlotTable {
    slots: Vec<Option<WorkUnit>>,
    queue: EventQueue<Event>,
}

/// State shared between the scheduler and its handles.
struct Shared {
    state: Mutex<SlotTable>,
    listener: RwLock<Option<Arc<dyn StatusListener>>>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn now(&self) -> u64 {
        self.clock.now()
    }

    fn with_table<R>(&self, f: impl FnOnce(&mut SlotTable) -> R) -> R {
        let mut guard = self.state.lock();
        f(&mut guard)
    }

    fn notify(&self, slot: usize) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.status_changed(slot);
        }
    }
}

fn slot_mut(slots: &mut [Option<WorkUnit>], slot: usize) -> ClientResult<&mut WorkUnit> {
    slots
        .get_mut(slot)
        .and_then(Option::as_mut)
        .ok_or_else(|| ClientError::error(ErrorCode::Internal, format!("slot {slot} has no work unit")))
}

fn other_slot_in(slots: &[Option<WorkUnit>], slot: usize, pred: impl Fn(Status) -> bool) -> bool {
    slots
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != slot)
        .filter_map(|(_, wu)| wu.as_ref())
        .any(|wu| pred(wu.status()))
}

/// Set and persist a status on the slot owning `wu`.
fn persist_status(wu: &mut WorkUnit, status: Status, now: u64) -> ClientResult<()> {
    wu.set_status(status, now);
    StatusFile::new(wu.working_dir()).write(status)
}

/// Cloneable handle used by compute executors and transfer progress sinks to report
/// back into the scheduler from any thread.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle").finish_non_exhaustive()
    }
}

impl SchedulerHandle {
    /// Set (and persist, when storable) a slot's status and queue the matching event now.
    pub fn change_work_unit_status(&self, slot: usize, status: Status) -> ClientResult<()> {
        let now = self.shared.now();
        self.shared.with_table(|t| -> ClientResult<()> {
            let wu = slot_mut(&mut t.slots, slot)?;
            persist_status(wu, status, now)?;
            t.queue.put(now, Event::advance(slot, status));
            Ok(())
        })?;
        debug!(slot, %status, "work unit status changed externally");
        self.shared.notify(slot);
        Ok(())
    }

    /// Update the progress of a slot's current phase.
    pub fn set_work_unit_progress(&self, slot: usize, progress: f32) -> ClientResult<()> {
        self.shared.with_table(|t| -> ClientResult<()> {
            slot_mut(&mut t.slots, slot)?.set_progress(progress);
            Ok(())
        })?;
        self.shared.notify(slot);
        Ok(())
    }

    /// Attach an error to a slot for status reporting.
    pub fn set_work_unit_error(&self, slot: usize, error: ClientError) -> ClientResult<()> {
        warn!("slot {} reported error: {}", slot, error);
        self.shared.with_table(|t| -> ClientResult<()> {
            slot_mut(&mut t.slots, slot)?.set_error(error);
            Ok(())
        })?;
        self.shared.notify(slot);
        Ok(())
    }

    /// Status snapshot of a slot, `None` when the slot does not exist or is not loaded.
    pub fn work_unit_status(&self, slot: usize) -> Option<WorkUnitStatus> {
        self.shared
            .with_table(|t| t.slots.get(slot).and_then(Option::as_ref).map(WorkUnit::snapshot))
    }

    fn progress_sink(&self, slot: usize) -> impl Fn(f32) + Send + Sync {
        let handle = self.clone();
        move |progress| {
            if let Err(e) = handle.set_work_unit_progress(slot, progress) {
                debug!(slot, "dropping progress update: {e}");
            }
        }
    }
}

/// Work-unit scheduler over a server [`Proxy`] and an application [`ComputeExecutor`].
pub struct Scheduler<P, C>
where
    P: Proxy,
    C: ComputeExecutor,
{
    settings: SchedulerConfig,
    config: SharedConfiguration,
    proxy: P,
    compute: C,
    handle: SchedulerHandle,
}

impl<P, C> Scheduler<P, C>
where
    P: Proxy,
    C: ComputeExecutor,
{
    /// Scheduler with default settings and the system clock.
    pub fn new(config: SharedConfiguration, proxy: P, compute: C) -> ClientResult<Self> {
        Self::from_parts(
            SchedulerConfig::default(),
            config,
            proxy,
            compute,
            Arc::new(SystemClock),
        )
    }

    /// Scheduler from explicit parts. The queue starts with the recovery event at time 0.
    pub fn from_parts(
        settings: SchedulerConfig,
        config: SharedConfiguration,
        proxy: P,
        compute: C,
        clock: Arc<dyn Clock>,
    ) -> ClientResult<Self> {
        settings
            .validate()
            .map_err(|e| ClientError::fatal(ErrorCode::Internal, format!("config invalid: {e}")))?;

        let mut queue = EventQueue::new();
        queue.put(0, Event::recover());
        let shared = Arc::new(Shared {
            state: Mutex::new(SlotTable {
                slots: (0..settings.slots).map(|_| None).collect(),
                queue,
            }),
            listener: RwLock::new(None),
            clock,
        });
        info!("scheduler created with {} slot(s)", settings.slots);
        Ok(Self {
            settings,
            config,
            proxy,
            compute,
            handle: SchedulerHandle { shared },
        })
    }

    /// Handle for executors and other threads.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Shared configuration store.
    pub fn configuration(&self) -> SharedConfiguration {
        Arc::clone(&self.config)
    }

    /// Scheduler tuning in effect.
    pub const fn settings(&self) -> &SchedulerConfig {
        &self.settings
    }

    /// The server proxy.
    pub const fn proxy(&self) -> &P {
        &self.proxy
    }

    /// Register the listener notified on every slot change, replacing any previous one.
    pub fn set_status_listener(&self, listener: impl StatusListener) {
        self.set_shared_status_listener(Arc::new(listener));
    }

    /// Register an already shared listener.
    pub fn set_shared_status_listener(&self, listener: Arc<dyn StatusListener>) {
        *self.handle.shared.listener.write() = Some(listener);
    }

    /// Whether an event is due now.
    pub fn has_events(&self) -> bool {
        let now = self.handle.shared.now();
        self.handle.shared.with_table(|t| t.queue.has_ready(now))
    }

    /// Time of the earliest queued event, if any.
    pub fn next_event_time(&self) -> Option<u64> {
        self.handle.shared.with_table(|t| t.queue.next_time())
    }

    /// Number of loaded slots.
    pub fn count_work_units(&self) -> usize {
        self.handle
            .shared
            .with_table(|t| t.slots.iter().filter(|wu| wu.is_some()).count())
    }

    /// See [`SchedulerHandle::change_work_unit_status`].
    pub fn change_work_unit_status(&self, slot: usize, status: Status) -> ClientResult<()> {
        self.handle.change_work_unit_status(slot, status)
    }

    /// See [`SchedulerHandle::set_work_unit_progress`].
    pub fn set_work_unit_progress(&self, slot: usize, progress: f32) -> ClientResult<()> {
        self.handle.set_work_unit_progress(slot, progress)
    }

    /// See [`SchedulerHandle::work_unit_status`].
    pub fn work_unit_status(&self, slot: usize) -> Option<WorkUnitStatus> {
        self.handle.work_unit_status(slot)
    }

    /// Switch account through the proxy.
    pub async fn change_authentication(&self, email: &str, password: &str) -> ClientResult<()> {
        self.proxy.change_authentication(email, password).await
    }

    /// Drop every pending event and return how many were discarded.
    pub fn shutdown(&self) -> usize {
        let drained = self.handle.shared.with_table(|t| t.queue.drain());
        info!("scheduler shut down, {} pending event(s) discarded", drained.len());
        drained.len()
    }

    /// Take one ready event and process it to completion.
    ///
    /// Returns `Ok(())` when nothing was ready. Errors are non-fatal (the event has
    /// been rescheduled) unless [`ClientError::is_fatal`] says otherwise.
    pub async fn handle_events(&self) -> ClientResult<()> {
        let shared = &self.handle.shared;
        let now = shared.now();
        let Some((_, event)) = shared.with_table(|t| t.queue.take_ready(now)) else {
            return Ok(());
        };
        match event.kind {
            EventKind::Recover => self.recover(event).await,
            EventKind::Advance(status) => {
                if event.slot >= self.settings.slots {
                    return Err(ClientError::error(
                        ErrorCode::Internal,
                        format!("event for unknown slot {}", event.slot),
                    ));
                }
                let outcome = self.advance(event, status).await;
                let outcome = match outcome {
                    Ok(()) => Ok(()),
                    Err(error) => self.fail(event, status, error),
                };
                shared.notify(event.slot);
                outcome
            }
        }
    }

    async fn advance(&self, event: Event, status: Status) -> ClientResult<()> {
        let slot = event.slot;
        debug!(slot, tries = event.tries, %status, "handling event");
        match status {
            Status::Created => self.on_created(event),
            Status::Initializing => self.on_initializing(slot).await,
            Status::Downloading => self.on_downloading(slot).await,
            Status::Waiting => self.on_waiting(event),
            Status::Computing => self.on_computing(slot),
            Status::Finished => self.on_finished(event),
            Status::Uploading => self.on_uploading(slot).await,
            Status::Completed => self.on_completed(slot, false).await,
            Status::Failed => self.on_completed(slot, true).await,
            Status::Defined | Status::Loading => {
                warn!("slot {} ignoring event for transient status {}", slot, status);
                Ok(())
            }
        }
    }

    // ==================== Recovery ====================

    async fn recover(&self, mut event: Event) -> ClientResult<()> {
        match self.try_recover().await {
            Ok(()) => Ok(()),
            Err(error) if error.is_fatal() => {
                error!("recovery failed: {}", error);
                Err(error)
            }
            Err(error) => {
                let policy = RetryPolicy::limited(
                    self.settings.recovery_delay_secs,
                    self.settings.recovery_max_tries,
                );
                let delay = retry::backoff(&mut event, policy, Some(&error))?;
                warn!(tries = event.tries, delay, "recovery failed, retrying: {error}");
                let shared = &self.handle.shared;
                let at = shared.now() + delay;
                shared.with_table(|t| t.queue.put(at, event));
                Err(error)
            }
        }
    }

    async fn try_recover(&self) -> ClientResult<()> {
        self.proxy.init().await?;
        let authenticated = self.config.read().has_non_empty(Parameter::Authenticator);
        if !authenticated {
            self.proxy.authenticate().await?;
        }

        let shared = &self.handle.shared;
        let mut recovered = Vec::with_capacity(self.settings.slots);
        for slot in 0..self.settings.slots {
            let dir = self.config.read().slot_directory(slot);
            recovered.push(self.recover_slot(slot, &dir).await?);
        }

        let now = shared.now();
        shared.with_table(|t| {
            for wu in recovered {
                let slot = wu.slot();
                let status = wu.status();
                let at = if status == Status::Computing { 0 } else { now };
                t.queue.put(at, Event::advance(slot, status));
                t.slots[slot] = Some(wu);
            }
        });
        for slot in 0..self.settings.slots {
            shared.notify(slot);
        }
        info!("recovered {} slot(s)", self.settings.slots);
        Ok(())
    }

    async fn recover_slot(&self, slot: usize, dir: &Path) -> ClientResult<WorkUnit> {
        let now = self.handle.shared.now();
        let mut wu = WorkUnit::create(slot, dir, now)?;
        let status = match StatusFile::new(dir).read() {
            Ok(Some(status)) => status,
            Ok(None) => {
                debug!(slot, "no status marker, starting fresh");
                return Self::discard(slot, dir, now);
            }
            Err(e) => {
                warn!("slot {} has a corrupt status marker: {}", slot, e);
                return Self::discard(slot, dir, now);
            }
        };
        if status >= Status::Downloading {
            match self.proxy.load_work_unit(dir).await {
                Ok(manifest) => wu.install(manifest),
                Err(e) => {
                    warn!("slot {} cannot reload its work unit: {}", slot, e);
                    return Self::discard(slot, dir, now);
                }
            }
        }
        wu.set_status(status, now);
        info!(slot, %status, "slot recovered");
        Ok(wu)
    }

    /// Remove a slot's directory and start over with an empty work unit.
    fn discard(slot: usize, dir: &Path, now: u64) -> ClientResult<WorkUnit> {
        remove_dir_if_exists(dir)?;
        WorkUnit::create(slot, dir, now)
    }

    // ==================== Transitions ====================

    fn on_created(&self, mut event: Event) -> ClientResult<()> {
        let slot = event.slot;
        let busy_retry = self.settings.busy_retry_secs;
        let now = self.handle.shared.now();
        self.handle.shared.with_table(|t| -> ClientResult<()> {
            let busy = other_slot_in(&t.slots, slot, Status::is_downloading);
            let wu = slot_mut(&mut t.slots, slot)?;
            wu.set_status(Status::Created, now);
            if busy {
                let delay = retry::backoff(&mut event, RetryPolicy::unlimited(busy_retry), None)?;
                wu.set_delay(delay);
                t.queue.put(now + delay, event);
                return Ok(());
            }
            wu.clear_error();
            wu.set_status(Status::Initializing, now);
            t.queue.put(now, Event::advance(slot, Status::Initializing));
            Ok(())
        })
    }

    async fn on_initializing(&self, slot: usize) -> ClientResult<()> {
        let shared = &self.handle.shared;
        let dir = shared.with_table(|t| {
            slot_mut(&mut t.slots, slot).map(|wu| wu.working_dir().to_path_buf())
        })?;
        let manifest = self.proxy.request_work(slot, &dir).await?;
        info!(
            "slot {} received work unit {}",
            slot,
            manifest.name.as_deref().unwrap_or("<unnamed>")
        );
        let now = shared.now();
        shared.with_table(|t| -> ClientResult<()> {
            let wu = slot_mut(&mut t.slots, slot)?;
            wu.install(manifest);
            wu.clear_error();
            t.queue.put(now, Event::advance(slot, Status::Downloading));
            Ok(())
        })
    }

    async fn on_downloading(&self, slot: usize) -> ClientResult<()> {
        let shared = &self.handle.shared;
        let now = shared.now();
        let wu = shared.with_table(|t| -> ClientResult<WorkUnit> {
            let wu = slot_mut(&mut t.slots, slot)?;
            persist_status(wu, Status::Downloading, now)?;
            Ok(wu.clone())
        })?;
        shared.notify(slot);

        // Verified inputs keep their place in the numbering.
        let inputs: Vec<FileInfo> = wu
            .manifest
            .input_files()
            .into_iter()
            .filter_map(|id| wu.manifest.file(id))
            .cloned()
            .collect();
        let total = inputs.len();
        debug!(slot, total, "input files");
        let sink = self.handle.progress_sink(slot);
        for (index, file) in inputs.iter().enumerate() {
            if !wu.file_needs_download(file) {
                debug!(slot, index, "input {} already verified", file.name);
                continue;
            }
            self.proxy.download_file(&wu, file, index, total, &sink).await?;
        }

        let now = shared.now();
        shared.with_table(|t| -> ClientResult<()> {
            slot_mut(&mut t.slots, slot)?.clear_error();
            t.queue.put(now, Event::advance(slot, Status::Waiting));
            Ok(())
        })
    }

    fn on_waiting(&self, mut event: Event) -> ClientResult<()> {
        let slot = event.slot;
        let busy_retry = self.settings.busy_retry_secs;
        let now = self.handle.shared.now();
        self.handle.shared.with_table(|t| -> ClientResult<()> {
            let busy = other_slot_in(&t.slots, slot, |s| s == Status::Computing);
            let wu = slot_mut(&mut t.slots, slot)?;
            persist_status(wu, Status::Waiting, now)?;
            if busy {
                let delay = retry::backoff(&mut event, RetryPolicy::unlimited(busy_retry), None)?;
                wu.set_delay(delay);
                t.queue.put(now + delay, event);
                return Ok(());
            }
            persist_status(wu, Status::Computing, now)?;
            wu.clear_error();
            t.queue.put(now, Event::advance(slot, Status::Computing));
            Ok(())
        })
    }

    fn on_computing(&self, slot: usize) -> ClientResult<()> {
        let shared = &self.handle.shared;
        let now = shared.now();
        let wu = shared.with_table(|t| -> ClientResult<WorkUnit> {
            let wu = slot_mut(&mut t.slots, slot)?;
            persist_status(wu, Status::Computing, now)?;
            wu.start_compute(now);
            Ok(wu.clone())
        })?;
        shared.notify(slot);
        info!("slot {} computing {}", slot, wu.name().unwrap_or("<unnamed>"));
        self.compute.compute(self.handle(), wu)
    }

    fn on_finished(&self, mut event: Event) -> ClientResult<()> {
        let slot = event.slot;
        let busy_retry = self.settings.busy_retry_secs;
        let now = self.handle.shared.now();
        self.handle.shared.with_table(|t| -> ClientResult<()> {
            let busy = other_slot_in(&t.slots, slot, |s| s == Status::Uploading);
            let wu = slot_mut(&mut t.slots, slot)?;
            persist_status(wu, Status::Finished, now)?;
            wu.finish_compute(now);
            if busy {
                let delay = retry::backoff(&mut event, RetryPolicy::unlimited(busy_retry), None)?;
                wu.set_delay(delay);
                t.queue.put(now + delay, event);
                return Ok(());
            }
            persist_status(wu, Status::Uploading, now)?;
            wu.clear_error();
            t.queue.put(now, Event::advance(slot, Status::Uploading));
            Ok(())
        })
    }

    async fn on_uploading(&self, slot: usize) -> ClientResult<()> {
        let shared = &self.handle.shared;
        let now = shared.now();
        let wu = shared.with_table(|t| -> ClientResult<WorkUnit> {
            let wu = slot_mut(&mut t.slots, slot)?;
            persist_status(wu, Status::Uploading, now)?;
            Ok(wu.clone())
        })?;
        shared.notify(slot);

        let outputs: Vec<FileInfo> = wu
            .manifest
            .output_files()
            .into_iter()
            .filter_map(|id| wu.manifest.file(id).cloned())
            .collect();
        let total = outputs.len();
        let sink = self.handle.progress_sink(slot);
        for (index, file) in outputs.iter().enumerate() {
            self.proxy.upload_file(&wu, file, index, total, &sink).await?;
        }

        let now = shared.now();
        shared.with_table(|t| -> ClientResult<()> {
            slot_mut(&mut t.slots, slot)?.clear_error();
            t.queue.put(now, Event::advance(slot, Status::Completed));
            Ok(())
        })
    }

    async fn on_completed(&self, slot: usize, failed: bool) -> ClientResult<()> {
        let shared = &self.handle.shared;
        let now = shared.now();
        let wu = shared.with_table(|t| -> ClientResult<WorkUnit> {
            let wu = slot_mut(&mut t.slots, slot)?;
            persist_status(wu, Status::Completed, now)?;
            Ok(wu.clone())
        })?;
        shared.notify(slot);

        self.proxy.report_executed(&wu, failed).await?;

        let now = shared.now();
        let fresh = Self::discard(slot, wu.working_dir(), now)?;
        shared.with_table(|t| {
            t.slots[slot] = Some(fresh);
            t.queue.put(now, Event::advance(slot, Status::Created));
        });
        // Count only after the slot is recycled; a failed erase retries the report.
        if failed {
            warn!("slot {} reported work unit {} as failed", slot, wu.name().unwrap_or("<unnamed>"));
        } else {
            self.count_completed();
            info!("slot {} completed work unit {}", slot, wu.name().unwrap_or("<unnamed>"));
        }
        Ok(())
    }

    fn count_completed(&self) {
        let mut config = self.config.write();
        let total = config.get_number(Parameter::TotalWorkUnits) + 1.0;
        let stored = config
            .set_number(Parameter::TotalWorkUnits, total)
            .and_then(|()| config.store());
        if let Err(e) = stored {
            warn!("cannot store completed work unit count: {}", e);
        }
    }

    // ==================== Failure handling ====================

    /// Attach `error` to the slot and reschedule `event` according to the status's policy.
    fn fail(&self, mut event: Event, status: Status, error: ClientError) -> ClientResult<()> {
        let slot = event.slot;
        if error.is_fatal() {
            error!("slot {} {} failed fatally: {}", slot, status, error);
            return Err(error);
        }
        let shared = &self.handle.shared;
        let now = shared.now();

        if status == Status::Uploading
            && error.code() == ErrorCode::FileSystem
            && event.tries >= self.settings.upload_failure_limit
        {
            warn!(slot, tries = event.tries, "upload keeps failing, giving up: {error}");
            shared.with_table(|t| -> ClientResult<()> {
                let wu = slot_mut(&mut t.slots, slot)?;
                wu.set_error(error.clone());
                wu.set_status(Status::Failed, now);
                t.queue.put(now, Event::advance(slot, Status::Failed));
                Ok(())
            })?;
            return Err(error);
        }

        let policy = match status {
            Status::Initializing | Status::Downloading | Status::Computing | Status::Uploading => {
                RetryPolicy::unlimited(error.delay().unwrap_or(0))
            }
            _ => RetryPolicy::unlimited(0),
        };
        let delay = retry::backoff(&mut event, policy, Some(&error))?;
        warn!(slot, tries = event.tries, delay, "{status} failed, retrying: {error}");
        shared.with_table(|t| {
            if let Ok(wu) = slot_mut(&mut t.slots, slot) {
                wu.set_error(error.clone());
                wu.set_delay(delay);
            }
            t.queue.put(now + delay, event);
        });
        Err(error)
    }
}
