//! Scheduler tuning: slot count and retry constants.

use serde::{Deserialize, Serialize};

/// Upper bound on concurrently managed work units.
pub const MAX_SLOTS: usize = 2;

/// Scheduler configuration. Defaults reproduce the reference client's timings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of work-unit slots (1 or 2).
    pub slots: usize,
    /// Fixed delay between recovery attempts, seconds.
    pub recovery_delay_secs: u64,
    /// Recovery attempts before the error becomes fatal.
    pub recovery_max_tries: u32,
    /// Delay before re-checking a busy download/compute/upload slot, seconds.
    pub busy_retry_secs: u64,
    /// Filesystem-coded upload failures tolerated before the work unit is failed.
    pub upload_failure_limit: u32,
    /// Sleep of the driving loop when no event is ready, milliseconds.
    pub idle_poll_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slots: MAX_SLOTS,
            recovery_delay_secs: 15,
            recovery_max_tries: 4,
            busy_retry_secs: 5,
            upload_failure_limit: 10,
            idle_poll_ms: 1000,
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.slots == 0 || self.slots > MAX_SLOTS {
            return Err(format!("slots must be between 1 and {MAX_SLOTS}"));
        }
        if self.recovery_delay_secs == 0 {
            return Err("recovery_delay_secs must be greater than 0".into());
        }
        if self.busy_retry_secs == 0 {
            return Err("busy_retry_secs must be greater than 0".into());
        }
        if self.upload_failure_limit == 0 {
            return Err("upload_failure_limit must be greater than 0".into());
        }
        if self.idle_poll_ms == 0 {
            return Err("idle_poll_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
