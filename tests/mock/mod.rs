//! Test doubles for the scheduler: an in-memory proxy, compute executors and a
//! clock-driving event pump.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use grid_client::config::{Configuration, SchedulerConfig};
use grid_client::core::{
    ClientError, ClientResult, ComputeExecutor, ErrorCode, FileInfo, Manifest, Progress, Proxy,
    Scheduler, SchedulerHandle, Status, WorkUnit,
};
use grid_client::util::fs::md5_hex;
use grid_client::util::ManualClock;

/// Saved reply the mock writes on `request_work` and expects on `load_work_unit`.
pub const SAVED_REPLY: &str = "workResponse.xml";
/// Content served for the input file.
pub const INPUT_DATA: &[u8] = b"grid input payload";

/// Recorded report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub name: String,
    pub failed: bool,
    pub status: Status,
}

/// Counters and knobs shared between a test and its [`MockProxy`].
#[derive(Debug, Default)]
pub struct MockState {
    pub init_calls: u32,
    pub authenticate_calls: u32,
    pub request_calls: u32,
    pub load_calls: u32,
    pub downloads: Vec<String>,
    pub uploads: Vec<String>,
    pub reports: Vec<Report>,
    /// Upload attempts still to fail with a filesystem error.
    pub upload_failures: u32,
    /// Upload attempts that failed so far.
    pub failed_uploads: u32,
    /// Fail the next `request_work` calls with a delayed network error.
    pub request_failures: u32,
    /// Fail the next `init` calls with a network error.
    pub init_failures: u32,
    /// `(index, total)` passed to every download.
    pub download_positions: Vec<(usize, usize)>,
    /// Hand out a second input file, `{name}_in2` opened as `in2`.
    pub extra_input: bool,
    /// Clock moved forward by the given seconds inside every `request_work`.
    pub slow_request: Option<(ManualClock, u64)>,
    /// Swap the slot directory for a plain file during the next report.
    pub break_slot_on_report: bool,
}

/// In-memory proxy handing out a one-input, one-output work unit.
#[derive(Debug, Clone, Default)]
pub struct MockProxy {
    state: Arc<Mutex<MockState>>,
}

impl MockProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, MockState> {
        self.state.lock()
    }

    fn manifest_for(&self, name: &str) -> Manifest {
        let mut manifest = Self::manifest(name);
        if self.state().extra_input {
            let mut input = FileInfo::named(format!("{name}_in2"));
            input.open_name = Some("in2".into());
            input.url = Some("http://mock/in2".into());
            input.checksum = Some(md5_hex(INPUT_DATA));
            let id = manifest.arena.insert(input);
            manifest.files.push(id);
        }
        manifest
    }

    /// The manifest every request returns.
    pub fn manifest(name: &str) -> Manifest {
        let mut manifest = Manifest {
            name: Some(name.to_string()),
            ..Manifest::default()
        };
        let mut exe = FileInfo::named("app_1.0");
        exe.flags.executable = true;
        exe.url = Some("http://mock/app_1.0".into());
        let exe = manifest.arena.insert(exe);

        let mut input = FileInfo::named(format!("{name}_in"));
        input.open_name = Some("in".into());
        input.url = Some("http://mock/in".into());
        input.checksum = Some(md5_hex(INPUT_DATA));
        let input = manifest.arena.insert(input);

        let mut output = FileInfo::named(format!("{name}_out"));
        output.open_name = Some("out".into());
        output.url = Some("http://mock/upload".into());
        output.flags.generated_locally = true;
        output.flags.upload = true;
        let output = manifest.arena.insert(output);

        manifest.app.version = Some("100".into());
        manifest.app.files = vec![exe];
        manifest.files = vec![input];
        manifest.result.name = Some(format!("{name}_0"));
        manifest.result.files = vec![output];
        manifest
    }
}

#[async_trait]
impl Proxy for MockProxy {
    async fn init(&self) -> ClientResult<()> {
        let mut state = self.state();
        state.init_calls += 1;
        if state.init_failures > 0 {
            state.init_failures -= 1;
            return Err(ClientError::error(ErrorCode::Network, "project unreachable"));
        }
        Ok(())
    }

    async fn authenticate(&self) -> ClientResult<()> {
        self.state().authenticate_calls += 1;
        Ok(())
    }

    async fn request_work(&self, _slot: usize, working_dir: &Path) -> ClientResult<Manifest> {
        let n = {
            let mut state = self.state();
            if state.request_failures > 0 {
                state.request_failures -= 1;
                return Err(ClientError::delayed(ErrorCode::Network, "server unreachable", 30));
            }
            state.request_calls += 1;
            if let Some((clock, secs)) = &state.slow_request {
                clock.advance(*secs);
            }
            state.request_calls
        };
        fs::write(working_dir.join(SAVED_REPLY), format!("wu_{n}"))?;
        Ok(self.manifest_for(&format!("wu_{n}")))
    }

    async fn load_work_unit(&self, working_dir: &Path) -> ClientResult<Manifest> {
        self.state().load_calls += 1;
        let name = fs::read_to_string(working_dir.join(SAVED_REPLY))
            .map_err(|e| ClientError::error(ErrorCode::FileSystem, e.to_string()))?;
        Ok(self.manifest_for(name.trim()))
    }

    async fn download_file(
        &self,
        workunit: &WorkUnit,
        file: &FileInfo,
        index: usize,
        total: usize,
        progress: Progress<'_>,
    ) -> ClientResult<()> {
        fs::write(workunit.file_path(file), INPUT_DATA)?;
        progress(100.0);
        let mut state = self.state();
        state.downloads.push(file.name.clone());
        state.download_positions.push((index, total));
        Ok(())
    }

    async fn upload_file(
        &self,
        workunit: &WorkUnit,
        file: &FileInfo,
        _index: usize,
        _total: usize,
        _progress: Progress<'_>,
    ) -> ClientResult<()> {
        let mut state = self.state();
        if state.upload_failures > 0 {
            state.upload_failures -= 1;
            state.failed_uploads += 1;
            return Err(ClientError::error(ErrorCode::FileSystem, "cannot access output"));
        }
        if !workunit.file_path(file).exists() {
            return Err(ClientError::error(ErrorCode::FileSystem, "output missing"));
        }
        state.uploads.push(file.name.clone());
        Ok(())
    }

    async fn report_executed(&self, workunit: &WorkUnit, failed: bool) -> ClientResult<()> {
        let mut state = self.state();
        state.reports.push(Report {
            name: workunit.name().unwrap_or_default().to_string(),
            failed,
            status: workunit.status(),
        });
        if std::mem::take(&mut state.break_slot_on_report) {
            let dir = workunit.working_dir();
            fs::remove_dir_all(dir)?;
            fs::write(dir, b"not a directory")?;
        }
        Ok(())
    }
}

fn write_outputs(workunit: &WorkUnit) -> ClientResult<()> {
    for id in workunit.manifest.output_files() {
        if let Some(file) = workunit.manifest.file(id) {
            fs::write(workunit.file_path(file), b"result")?;
        }
    }
    Ok(())
}

/// Computes inline: writes every output and reports `Finished` immediately.
#[derive(Debug, Clone, Default)]
pub struct InlineCompute {
    pub runs: Arc<Mutex<Vec<usize>>>,
}

impl ComputeExecutor for InlineCompute {
    fn compute(&self, handle: SchedulerHandle, workunit: WorkUnit) -> ClientResult<()> {
        self.runs.lock().push(workunit.slot());
        write_outputs(&workunit)?;
        handle.change_work_unit_status(workunit.slot(), Status::Finished)
    }
}

/// Parks every job until the test finishes it.
#[derive(Debug, Clone, Default)]
pub struct DeferredCompute {
    pub jobs: Arc<Mutex<Vec<(SchedulerHandle, WorkUnit)>>>,
}

impl DeferredCompute {
    pub fn pending(&self) -> Vec<usize> {
        self.jobs.lock().iter().map(|(_, wu)| wu.slot()).collect()
    }

    /// Complete the oldest parked job.
    pub fn finish_next(&self) -> Option<usize> {
        let (handle, workunit) = {
            let mut jobs = self.jobs.lock();
            if jobs.is_empty() {
                return None;
            }
            jobs.remove(0)
        };
        write_outputs(&workunit).unwrap();
        handle
            .change_work_unit_status(workunit.slot(), Status::Finished)
            .unwrap();
        Some(workunit.slot())
    }
}

impl ComputeExecutor for DeferredCompute {
    fn compute(&self, handle: SchedulerHandle, workunit: WorkUnit) -> ClientResult<()> {
        self.jobs.lock().push((handle, workunit));
        Ok(())
    }
}

/// Scheduler over a fresh project directory with a manual clock at `START`.
pub struct Harness<C: ComputeExecutor> {
    pub dir: tempfile::TempDir,
    pub clock: ManualClock,
    pub proxy: MockProxy,
    pub scheduler: Scheduler<MockProxy, C>,
}

pub const START: u64 = 1_000;

impl<C: ComputeExecutor> Harness<C> {
    /// Build over an existing directory, so tests can seed slot state first.
    pub fn in_dir(dir: tempfile::TempDir, slots: usize, proxy: MockProxy, compute: C) -> Self {
        let clock = ManualClock::new(START);
        let settings = SchedulerConfig {
            slots,
            ..SchedulerConfig::default()
        };
        let config = Configuration::new(dir.path()).shared();
        let scheduler = Scheduler::from_parts(
            settings,
            config,
            proxy.clone(),
            compute,
            Arc::new(clock.clone()),
        )
        .unwrap();
        Self {
            dir,
            clock,
            proxy,
            scheduler,
        }
    }

    pub fn new(slots: usize, proxy: MockProxy, compute: C) -> Self {
        Self::in_dir(tempfile::tempdir().unwrap(), slots, proxy, compute)
    }

    pub fn slot_dir(&self, slot: usize) -> PathBuf {
        self.dir.path().join(slot.to_string())
    }

    pub fn status(&self, slot: usize) -> Option<Status> {
        status_of(&self.scheduler, slot)
    }

    pub async fn drive(&self, max_steps: usize, done: impl FnMut(&Scheduler<MockProxy, C>) -> bool) -> bool {
        drive_until(&self.scheduler, &self.clock, max_steps, done).await
    }
}

/// Handle events, jumping the clock to the next event whenever nothing is ready,
/// until `done` holds or `max_steps` events were handled. Returns whether `done` held.
pub async fn drive_until<P, C>(
    scheduler: &Scheduler<P, C>,
    clock: &ManualClock,
    max_steps: usize,
    mut done: impl FnMut(&Scheduler<P, C>) -> bool,
) -> bool
where
    P: Proxy,
    C: ComputeExecutor,
{
    for _ in 0..max_steps {
        if done(scheduler) {
            return true;
        }
        if !scheduler.has_events() {
            match scheduler.next_event_time() {
                Some(at) => clock.set(at),
                None => return done(scheduler),
            }
        }
        if let Err(e) = scheduler.handle_events().await {
            assert!(!e.is_fatal(), "unexpected fatal error: {e}");
        }
    }
    done(scheduler)
}

pub fn status_of<P: Proxy, C: ComputeExecutor>(scheduler: &Scheduler<P, C>, slot: usize) -> Option<Status> {
    scheduler.work_unit_status(slot).map(|s| s.status)
}
