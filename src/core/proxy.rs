//! Server-side capability consumed by the scheduler.

use std::path::Path;

use async_trait::async_trait;

use super::error::{ClientError, ClientResult, ErrorCode};
use super::workunit::{FileInfo, Manifest, WorkUnit};

/// Progress sink handed to transfers; values are percentages of the whole phase.
pub type Progress<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// Translates scheduler intents into project server requests.
#[async_trait]
pub trait Proxy: Send + Sync + 'static {
    /// Prepare for a session, e.g. fetch the project configuration.
    async fn init(&self) -> ClientResult<()> {
        Ok(())
    }

    /// Obtain an authenticator from the cached credentials.
    async fn authenticate(&self) -> ClientResult<()>;

    /// Switch to a different account.
    async fn change_authentication(&self, _email: &str, _password: &str) -> ClientResult<()> {
        Err(ClientError::error(
            ErrorCode::Authentication,
            "changing credentials is not supported by this proxy",
        ))
    }

    /// Ask the server for a new assignment for `slot`, keeping whatever is needed to
    /// reload it later in `working_dir`.
    async fn request_work(&self, slot: usize, working_dir: &Path) -> ClientResult<Manifest>;

    /// Reload the assignment previously obtained into `working_dir`.
    async fn load_work_unit(&self, working_dir: &Path) -> ClientResult<Manifest>;

    /// Fetch one input file into the work unit's directory.
    async fn download_file(
        &self,
        workunit: &WorkUnit,
        file: &FileInfo,
        index: usize,
        total: usize,
        progress: Progress<'_>,
    ) -> ClientResult<()>;

    /// Send one result file.
    async fn upload_file(
        &self,
        workunit: &WorkUnit,
        file: &FileInfo,
        index: usize,
        total: usize,
        progress: Progress<'_>,
    ) -> ClientResult<()>;

    /// Tell the server the work unit is done, or failed.
    async fn report_executed(&self, workunit: &WorkUnit, failed: bool) -> ClientResult<()>;
}
