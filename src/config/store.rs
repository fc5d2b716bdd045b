//! Persistent client parameter store.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::parameters::{Parameter, ValueKind};
use crate::core::{ClientError, ClientResult, ErrorCode};
use crate::util::fs::write_atomic;

/// Configuration filename inside the project directory.
pub const CONFIG_FILE: &str = "client.json";
/// Temp filename used while replacing the configuration.
pub const CONFIG_TEMP_FILE: &str = "client.json.tmp";

/// Configuration shared between the scheduler, the proxy, and the application.
pub type SharedConfiguration = Arc<RwLock<Configuration>>;

/// Typed key/value store for client parameters.
#[derive(Debug, Clone)]
pub struct Configuration {
    dir: PathBuf,
    values: BTreeMap<Parameter, String>,
}

impl Configuration {
    /// Empty configuration rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let mut values = BTreeMap::new();
        values.insert(Parameter::ProjectDirectory, dir.display().to_string());
        Self { dir, values }
    }

    /// Load the configuration stored in `dir`. A missing file yields defaults.
    pub fn load(dir: impl AsRef<Path>) -> ClientResult<Self> {
        let mut conf = Self::new(dir);
        let path = conf.file_path();
        match fs::read_to_string(&path) {
            Ok(raw) => {
                let stored: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
                    ClientError::error(ErrorCode::FileSystem, format!("{}: {e}", path.display()))
                })?;
                for (key, value) in stored {
                    match Parameter::from_key(&key) {
                        Some(p) if p.is_storable() => {
                            conf.values.insert(p, value);
                        }
                        _ => debug!(key, "ignoring stored parameter"),
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(dir = %conf.dir.display(), "no stored configuration, using defaults");
            }
            Err(e) => return Err(e.into()),
        }
        conf.apply_defaults();
        Ok(conf)
    }

    fn apply_defaults(&mut self) {
        self.values
            .entry(Parameter::HostId)
            .or_insert_with(|| "0".to_string());
        self.values
            .entry(Parameter::HostCpid)
            .or_insert_with(|| uuid::Uuid::new_v4().simple().to_string());
    }

    /// Wrap for sharing.
    pub fn shared(self) -> SharedConfiguration {
        Arc::new(RwLock::new(self))
    }

    /// Project directory.
    pub fn project_directory(&self) -> &Path {
        &self.dir
    }

    /// Working directory of a slot.
    pub fn slot_directory(&self, slot: usize) -> PathBuf {
        self.dir.join(slot.to_string())
    }

    fn file_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Write storable parameters to disk atomically.
    pub fn store(&self) -> ClientResult<()> {
        let stored: BTreeMap<&str, &str> = self
            .values
            .iter()
            .filter(|(p, _)| p.is_storable())
            .map(|(p, v)| (p.key(), v.as_str()))
            .collect();
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| ClientError::error(ErrorCode::Internal, e.to_string()))?;
        fs::create_dir_all(&self.dir)?;
        write_atomic(&self.file_path(), &self.dir.join(CONFIG_TEMP_FILE), json)?;
        Ok(())
    }

    /// Whether the parameter has a value.
    pub fn has(&self, parameter: Parameter) -> bool {
        parameter.def().computed.is_some() || self.values.contains_key(&parameter)
    }

    /// Whether the parameter has a non-empty value.
    pub fn has_non_empty(&self, parameter: Parameter) -> bool {
        self.get_text(parameter).is_some_and(|v| !v.is_empty())
    }

    /// Value as text.
    pub fn get_text(&self, parameter: Parameter) -> Option<String> {
        match parameter.def().computed {
            Some(compute) => Some(compute()),
            None => self.values.get(&parameter).cloned(),
        }
    }

    /// Value as text, empty when unset.
    pub fn text_or_empty(&self, parameter: Parameter) -> String {
        self.get_text(parameter).unwrap_or_default()
    }

    /// Value as a number; unset or unparsable values read as `0`.
    pub fn get_number(&self, parameter: Parameter) -> f64 {
        self.get_text(parameter)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0.0)
    }

    fn check_writable(parameter: Parameter, kind: ValueKind) -> ClientResult<()> {
        if parameter.is_read_only() {
            return Err(ClientError::error(
                ErrorCode::Internal,
                format!("parameter `{}` cannot be modified", parameter.key()),
            ));
        }
        if parameter.def().kind != kind {
            return Err(ClientError::error(
                ErrorCode::Internal,
                format!("parameter `{}` is not of type {kind:?}", parameter.key()),
            ));
        }
        Ok(())
    }

    /// Set a text parameter.
    pub fn set_text(&mut self, parameter: Parameter, value: impl Into<String>) -> ClientResult<()> {
        Self::check_writable(parameter, ValueKind::Text)?;
        self.values.insert(parameter, value.into());
        Ok(())
    }

    /// Set a number parameter.
    pub fn set_number(&mut self, parameter: Parameter, value: f64) -> ClientResult<()> {
        Self::check_writable(parameter, ValueKind::Number)?;
        let text = if value.is_finite() && value.fract() == 0.0 {
            format!("{value:.0}")
        } else {
            value.to_string()
        };
        self.values.insert(parameter, text);
        Ok(())
    }

    /// Merge values handed out by the server. Unknown keys and host-derived
    /// parameters are ignored. Returns the number of values applied.
    pub fn update_from_pairs<I, K, V>(&mut self, pairs: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut applied = 0;
        for (key, value) in pairs {
            let Some(parameter) = Parameter::from_key(key.as_ref()) else {
                continue;
            };
            if parameter.def().computed.is_some() || parameter == Parameter::ProjectDirectory {
                continue;
            }
            self.values.insert(parameter, value.into());
            applied += 1;
        }
        applied
    }

    /// Check that the client can talk to a project.
    pub fn validate(&self) -> Result<(), String> {
        match self.get_text(Parameter::ProjectUrl) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
            Some(url) => Err(format!("project_url `{url}` is not an http(s) URL")),
            None => Err("project_url is not set".into()),
        }
    }
}
