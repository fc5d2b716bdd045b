//! Client parameter table.
//!
//! Each parameter has a key, which is both its name in the stored configuration and
//! the element name the server uses when it hands out a new value.

use std::env::consts::{ARCH, OS};

/// Value type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Free text.
    Text,
    /// Decimal number.
    Number,
}

/// Static description of a parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParameterDef {
    /// Storage and server-reply key.
    pub key: &'static str,
    /// Value type.
    pub kind: ValueKind,
    /// Cannot be set through the public setters.
    pub read_only: bool,
    /// Never written to the configuration file.
    pub transient: bool,
    /// Value derived from the host on every read.
    pub computed: Option<fn() -> String>,
}

impl ParameterDef {
    const fn text(key: &'static str) -> Self {
        Self {
            key,
            kind: ValueKind::Text,
            read_only: false,
            transient: false,
            computed: None,
        }
    }

    const fn number(key: &'static str) -> Self {
        Self {
            kind: ValueKind::Number,
            ..Self::text(key)
        }
    }

    const fn transient(self) -> Self {
        Self {
            transient: true,
            ..self
        }
    }

    const fn read_only(self) -> Self {
        Self {
            read_only: true,
            ..self
        }
    }

    const fn computed(self, f: fn() -> String) -> Self {
        Self {
            computed: Some(f),
            read_only: true,
            transient: true,
            ..self
        }
    }
}

/// Known client parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    /// Project master URL.
    ProjectUrl,
    /// Scheduler endpoint, learned from the project configuration.
    SchedulerUrl,
    /// Host id assigned by the server.
    HostId,
    /// Account email.
    UserEmail,
    /// Account display name.
    UserName,
    /// MD5 of password followed by email.
    PasswordHash,
    /// Session authenticator.
    Authenticator,
    /// Credit granted so far.
    TotalCredit,
    /// Team name.
    TeamName,
    /// Host cross-project id.
    HostCpid,
    /// Logical CPU count.
    HostCpuCount,
    /// Operating system name.
    HostOsName,
    /// Platform string sent with requests.
    PlatformName,
    /// HTTP proxy URL.
    HttpProxy,
    /// Directory holding configuration and slot directories.
    ProjectDirectory,
    /// Lifetime count of completed work units.
    TotalWorkUnits,
    /// Preferred language.
    Language,
}

impl Parameter {
    /// Every parameter.
    pub const ALL: [Self; 17] = [
        Self::ProjectUrl,
        Self::SchedulerUrl,
        Self::HostId,
        Self::UserEmail,
        Self::UserName,
        Self::PasswordHash,
        Self::Authenticator,
        Self::TotalCredit,
        Self::TeamName,
        Self::HostCpid,
        Self::HostCpuCount,
        Self::HostOsName,
        Self::PlatformName,
        Self::HttpProxy,
        Self::ProjectDirectory,
        Self::TotalWorkUnits,
        Self::Language,
    ];

    /// Static description.
    pub const fn def(self) -> ParameterDef {
        match self {
            Self::ProjectUrl => ParameterDef::text("project_url"),
            Self::SchedulerUrl => ParameterDef::text("scheduler").transient(),
            Self::HostId => ParameterDef::text("hostid"),
            Self::UserEmail => ParameterDef::text("email_addr"),
            Self::UserName => ParameterDef::text("user_name"),
            Self::PasswordHash => ParameterDef::text("passwd_hash"),
            Self::Authenticator => ParameterDef::text("authenticator").transient(),
            Self::TotalCredit => ParameterDef::number("total_credit"),
            Self::TeamName => ParameterDef::text("team_name"),
            Self::HostCpid => ParameterDef::text("host_cpid"),
            Self::HostCpuCount => ParameterDef::number("p_ncpus").computed(cpu_count),
            Self::HostOsName => ParameterDef::text("os_name").computed(os_name),
            Self::PlatformName => ParameterDef::text("platform_name").computed(platform_name),
            Self::HttpProxy => ParameterDef::text("http_proxy"),
            Self::ProjectDirectory => ParameterDef::text("project_dir").read_only().transient(),
            Self::TotalWorkUnits => ParameterDef::number("total_workunits"),
            Self::Language => ParameterDef::text("language"),
        }
    }

    /// Storage key.
    pub const fn key(self) -> &'static str {
        self.def().key
    }

    /// Look a parameter up by key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    /// Whether public setters refuse this parameter.
    pub const fn is_read_only(self) -> bool {
        let def = self.def();
        def.read_only || def.computed.is_some()
    }

    /// Whether the value is written to the configuration file.
    pub const fn is_storable(self) -> bool {
        !self.def().transient
    }
}

fn cpu_count() -> String {
    num_cpus::get().to_string()
}

fn os_name() -> String {
    OS.to_string()
}

/// Platform string in the form project servers expect.
pub fn platform_name() -> String {
    match (ARCH, OS) {
        ("x86_64", "linux") => "x86_64-pc-linux-gnu".into(),
        ("x86", "linux") => "i686-pc-linux-gnu".into(),
        ("x86_64", "macos") => "x86_64-apple-darwin".into(),
        ("aarch64", "macos") => "arm64-apple-darwin".into(),
        ("x86_64", "windows") => "windows_x86_64".into(),
        ("x86", "windows") => "windows_intelx86".into(),
        (arch, "linux") => format!("{arch}-unknown-linux-gnu"),
        (arch, os) => format!("{arch}-{os}"),
    }
}
