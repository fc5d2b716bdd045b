//! Error types for client and scheduler operations.
//!
//! Every failure carries two orthogonal classifications: a [`Severity`] that tells the
//! scheduler how to react (retry, log, or stop) and an [`ErrorCode`] that names the
//! subsystem at fault. Server-requested backoff travels with the error as `delay`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How serious an error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Diagnostic only.
    Debug,
    /// The server asked us to come back later.
    Delay,
    /// Informational.
    Info,
    /// Recoverable failure; the transition is retried.
    #[default]
    Error,
    /// Unrecoverable; the driving loop must stop.
    Fatal,
}

/// Subsystem responsible for an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No specific subsystem.
    #[default]
    Undefined,
    /// Logic error inside the client.
    Internal,
    /// Operating system or resource exhaustion.
    System,
    /// Local file or directory access.
    FileSystem,
    /// Transport failure.
    Network,
    /// Malformed or negative server reply.
    Server,
    /// Credentials rejected or missing.
    Authentication,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Delay => "delay",
            Self::Info => "info",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Undefined => "undefined",
            Self::Internal => "internal",
            Self::System => "system",
            Self::FileSystem => "filesystem",
            Self::Network => "network",
            Self::Server => "server",
            Self::Authentication => "authentication",
        };
        f.write_str(s)
    }
}

/// Error produced by the scheduler, the proxy, or the configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{severity} ({code}): {message}")]
pub struct ClientError {
    severity: Severity,
    code: ErrorCode,
    message: String,
    delay: Option<u64>,
}

impl ClientError {
    /// Create an error with an explicit severity.
    pub fn new(severity: Severity, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            delay: None,
        }
    }

    /// Recoverable error.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Unrecoverable error.
    pub fn fatal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, code, message)
    }

    /// Server-requested backoff of `delay` seconds.
    pub fn delayed(code: ErrorCode, message: impl Into<String>, delay: u64) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(Severity::Delay, code, message)
        }
    }

    /// Severity of the error.
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Subsystem code of the error.
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Backoff requested by the error source, in seconds.
    pub const fn delay(&self) -> Option<u64> {
        self.delay
    }

    /// Whether the driving loop must stop.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Same code and message, escalated to [`Severity::Fatal`].
    #[must_use]
    pub fn into_fatal(self) -> Self {
        Self {
            severity: Severity::Fatal,
            ..self
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::error(ErrorCode::FileSystem, e.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::error(ErrorCode::Network, e.to_string())
    }
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
