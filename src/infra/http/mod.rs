//! HTTP implementation of the server [`Proxy`] on top of `reqwest`.
//!
//! Every exchange is kept on disk next to the data it concerns: the project
//! configuration in the project directory, scheduler requests and replies in the
//! slot directory. `load_work_unit` re-parses the saved reply after a restart.

pub mod reply;
pub mod request;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{Parameter, SharedConfiguration};
use crate::core::{
    ClientError, ClientResult, ErrorCode, FileInfo, Manifest, Progress, Proxy, WorkUnit,
};
use crate::util::fs::{md5_hex, password_hash, set_file_mode};

/// Saved project configuration.
pub const PROJECT_FILE: &str = "project.xml";
/// Saved work request.
pub const WORK_REQUEST_FILE: &str = "workRequest.xml";
/// Saved scheduler reply holding the assignment.
pub const WORK_RESPONSE_FILE: &str = "workResponse.xml";
/// Saved result report.
pub const RESULT_REQUEST_FILE: &str = "resultRequest.xml";
/// Saved reply to the result report.
pub const RESULT_RESPONSE_FILE: &str = "resultResponse.xml";

/// Overall progress of file `index` of `total` at `fraction` (0..=1) of its own transfer.
pub fn overall_progress(index: usize, total: usize, fraction: f32) -> f32 {
    let total = total.max(1) as f32;
    ((index as f32 + fraction.clamp(0.0, 1.0)) * 100.0 / total).clamp(0.0, 100.0)
}

/// Server proxy speaking the volunteer-computing HTTP protocol.
#[derive(Debug, Clone)]
pub struct HttpProxy {
    client: reqwest::Client,
    config: SharedConfiguration,
}

impl HttpProxy {
    /// Build a proxy over the shared configuration, honouring its `http_proxy`.
    pub fn new(config: SharedConfiguration) -> ClientResult<Self> {
        let proxy_url = {
            let guard = config.read();
            guard
                .validate()
                .map_err(|e| ClientError::fatal(ErrorCode::Internal, format!("config invalid: {e}")))?;
            guard.get_text(Parameter::HttpProxy).filter(|p| !p.is_empty())
        };
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(url) = proxy_url {
            debug!("using http proxy {}", url);
            builder = builder.proxy(reqwest::Proxy::all(url.as_str())?);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    fn project_url(&self) -> ClientResult<String> {
        self.config
            .read()
            .get_text(Parameter::ProjectUrl)
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| ClientError::error(ErrorCode::Internal, "project_url is not set"))
    }

    fn scheduler_url(&self) -> ClientResult<String> {
        self.config
            .read()
            .get_text(Parameter::SchedulerUrl)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ClientError::error(ErrorCode::Server, "scheduler URL is not known yet"))
    }

    fn project_dir(&self) -> PathBuf {
        self.config.read().project_directory().to_path_buf()
    }

    async fn get_text(&self, url: &str) -> ClientResult<String> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn post(&self, url: &str, body: Vec<u8>) -> ClientResult<String> {
        debug!("POST {} ({} bytes)", url, body.len());
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    /// Merge top-level reply values into the configuration and store it.
    fn merge_config(&self, xml: &str) -> ClientResult<()> {
        let pairs = reply::config_pairs(xml)?;
        let mut config = self.config.write();
        let applied = config.update_from_pairs(pairs);
        debug!(applied, "merged server values into configuration");
        config.store()
    }

    fn save(path: &Path, contents: &str) -> ClientResult<()> {
        fs::write(path, contents).map_err(|e| {
            ClientError::error(ErrorCode::FileSystem, format!("cannot write {}: {e}", path.display()))
        })
    }

    fn read_saved(path: &Path) -> ClientResult<String> {
        fs::read_to_string(path).map_err(|e| {
            ClientError::error(ErrorCode::FileSystem, format!("cannot read {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl Proxy for HttpProxy {
    async fn init(&self) -> ClientResult<()> {
        let url = format!("{}/get_project_config.php", self.project_url()?);
        let body = self.get_text(&url).await?;
        Self::save(&self.project_dir().join(PROJECT_FILE), &body)?;
        self.merge_config(&body)?;
        info!("project configuration loaded");
        Ok(())
    }

    async fn authenticate(&self) -> ClientResult<()> {
        let (email, hash) = {
            let config = self.config.read();
            (
                config.text_or_empty(Parameter::UserEmail),
                config.text_or_empty(Parameter::PasswordHash),
            )
        };
        if email.is_empty() || hash.is_empty() {
            return Err(ClientError::error(ErrorCode::Authentication, "no credentials configured"));
        }
        let url = format!("{}/lookup_account.php", self.project_url()?);
        debug!("GET {}", url);
        let body = self
            .client
            .get(&url)
            .query(&[("email_addr", email.as_str()), ("passwd_hash", hash.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let auth = reply::parse_auth_reply(&body)?;
        if let Some(message) = auth.error {
            return Err(ClientError::error(ErrorCode::Authentication, message));
        }
        let authenticator = auth.authenticator.ok_or_else(|| {
            ClientError::error(ErrorCode::Authentication, "Authentication error")
        })?;
        let mut config = self.config.write();
        config.set_text(Parameter::Authenticator, authenticator)?;
        config.store()?;
        info!("authenticated as {}", email);
        Ok(())
    }

    async fn change_authentication(&self, email: &str, password: &str) -> ClientResult<()> {
        {
            let mut config = self.config.write();
            config.set_text(Parameter::UserEmail, email)?;
            config.set_text(Parameter::PasswordHash, password_hash(email, password))?;
            config.store()?;
        }
        self.authenticate().await
    }

    async fn request_work(&self, slot: usize, working_dir: &Path) -> ClientResult<Manifest> {
        let url = self.scheduler_url()?;
        let document = request::work_request(&self.config.read());
        Self::save(&working_dir.join(WORK_REQUEST_FILE), &document)?;

        info!("slot {} requesting work", slot);
        let body = self.post(&url, document.into_bytes()).await?;
        Self::save(&working_dir.join(WORK_RESPONSE_FILE), &body)?;
        if let Err(e) = self.merge_config(&body) {
            warn!("cannot merge scheduler reply into configuration: {}", e);
        }
        reply::parse_scheduler_reply(&body)?.into_manifest()
    }

    async fn load_work_unit(&self, working_dir: &Path) -> ClientResult<Manifest> {
        let body = Self::read_saved(&working_dir.join(WORK_RESPONSE_FILE))?;
        reply::parse_scheduler_reply(&body)?.into_manifest()
    }

    async fn download_file(
        &self,
        workunit: &WorkUnit,
        file: &FileInfo,
        index: usize,
        total: usize,
        progress: Progress<'_>,
    ) -> ClientResult<()> {
        let url = file
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ClientError::error(ErrorCode::Internal, "no url provided"))?;
        let path = workunit.file_path(file);
        debug!(slot = workunit.slot(), "downloading {} to {}", url, path.display());

        let mut response = self.client.get(url).send().await?.error_for_status()?;
        let expected = response.content_length().unwrap_or(file.nbytes);
        let mut out = File::create(&path)?;
        let mut received: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            out.write_all(&chunk)?;
            received += chunk.len() as u64;
            if expected > 0 {
                progress(overall_progress(index, total, received as f32 / expected as f32));
            }
        }
        out.flush()?;
        set_file_mode(&path, file.flags.executable || file.flags.main_program)?;
        progress(overall_progress(index + 1, total, 0.0));
        Ok(())
    }

    async fn upload_file(
        &self,
        workunit: &WorkUnit,
        file: &FileInfo,
        index: usize,
        total: usize,
        progress: Progress<'_>,
    ) -> ClientResult<()> {
        let url = file
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ClientError::error(ErrorCode::Internal, "no url provided"))?;

        let probe = self
            .post(url, request::file_size_request(file).into_bytes())
            .await?;
        debug!(slot = workunit.slot(), "size probe for {}: {}", file.name, probe.trim());

        let path = workunit.file_path(file);
        let data = fs::read(&path).map_err(|e| {
            ClientError::error(ErrorCode::FileSystem, format!("cannot access to {}: {e}", path.display()))
        })?;
        let checksum = md5_hex(&data);
        let mut body = request::upload_header(file, data.len() as u64, &checksum).into_bytes();
        body.extend_from_slice(&data);

        progress(overall_progress(index, total, 0.0));
        let reply = self.post(url, body).await?;
        reply::parse_upload_reply(&reply)?.into_result()?;
        progress(overall_progress(index + 1, total, 0.0));
        info!(slot = workunit.slot(), "uploaded {}", file.name);
        Ok(())
    }

    async fn report_executed(&self, workunit: &WorkUnit, failed: bool) -> ClientResult<()> {
        let url = self.scheduler_url()?;
        let document = request::result_report(&self.config.read(), workunit, failed);
        let dir = workunit.working_dir();
        Self::save(&dir.join(RESULT_REQUEST_FILE), &document)?;
        let body = self.post(&url, document.into_bytes()).await?;
        Self::save(&dir.join(RESULT_RESPONSE_FILE), &body)?;
        if let Err(e) = self.merge_config(&body) {
            warn!("cannot merge result reply into configuration: {}", e);
        }
        Ok(())
    }
}
