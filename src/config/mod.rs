//! Configuration management for the mailer

use crate::error::{MailError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default port used when none is configured
pub const DEFAULT_SMTP_PORT: i64 = 25;

/// Default templates location, relative to the config dir
pub const DEFAULT_TEMPLATES_PATH: &str = "templates";

/// System-wide directories searched for shared data such as templates
#[cfg(unix)]
pub const SHARED_DATA_DIRS: &[&str] = &["/usr/share/auth9", "/usr/local/share/auth9"];
#[cfg(not(unix))]
pub const SHARED_DATA_DIRS: &[&str] = &[];

/// SMTP configuration used to send emails
///
/// Leave `host` empty to disable email sending.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// SMTP server host
    pub host: String,

    /// SMTP server port
    pub port: i64,

    /// From address, for example "Auth9 <noreply@example.com>".
    /// Many SMTP servers reject emails without a `From` header, so the
    /// username is used when this is empty.
    pub from: String,

    /// Username for authentication
    pub user: String,

    /// Password for authentication. Leaving both user and password empty
    /// disables authentication.
    pub password: String,

    /// 0 PLAIN, 1 LOGIN, 2 CRAM-MD5
    pub auth_type: i64,

    /// 0 none, 1 TLS, 2 STARTTLS
    pub encryption: i64,

    /// Domain to use for the HELO command, "localhost" if empty
    pub domain: String,

    /// Absolute path or path relative to the config dir. Templates are
    /// looked up in its "email" subdirectory.
    pub templates_path: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_SMTP_PORT,
            from: String::new(),
            user: String::new(),
            password: String::new(),
            auth_type: 0,
            encryption: 0,
            domain: String::new(),
            templates_path: DEFAULT_TEMPLATES_PATH.to_string(),
        }
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from", &self.from)
            .field("user", &self.user)
            .field("password", &"***")
            .field("auth_type", &self.auth_type)
            .field("encryption", &self.encryption)
            .field("domain", &self.domain)
            .field("templates_path", &self.templates_path)
            .finish()
    }
}

impl SmtpConfig {
    /// Load `.env` (if present) and then read the environment
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from `SMTP_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: env::var("SMTP_HOST").unwrap_or_default(),
            port: match env::var("SMTP_PORT") {
                Ok(value) => value.parse().context("Invalid SMTP_PORT")?,
                Err(_) => defaults.port,
            },
            from: env::var("SMTP_FROM").unwrap_or_default(),
            user: env::var("SMTP_USER").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            auth_type: match env::var("SMTP_AUTH_TYPE") {
                Ok(value) => value.parse().context("Invalid SMTP_AUTH_TYPE")?,
                Err(_) => defaults.auth_type,
            },
            encryption: match env::var("SMTP_ENCRYPTION") {
                Ok(value) => value.parse().context("Invalid SMTP_ENCRYPTION")?,
                Err(_) => defaults.encryption,
            },
            domain: env::var("SMTP_DOMAIN").unwrap_or_default(),
            templates_path: env::var("SMTP_TEMPLATES_PATH").unwrap_or(defaults.templates_path),
        })
    }

    /// Whether email sending is enabled by this configuration
    pub fn is_enabled(&self) -> bool {
        !self.host.is_empty()
    }

    /// Check the numeric settings against their valid ranges
    pub fn validate(&self) -> Result<()> {
        if self.port <= 0 || self.port > 65535 {
            return Err(MailError::InvalidPort(self.port));
        }
        if !(0..=2).contains(&self.auth_type) {
            return Err(MailError::InvalidAuthType(self.auth_type));
        }
        if !(0..=2).contains(&self.encryption) {
            return Err(MailError::InvalidEncryption(self.encryption));
        }
        Ok(())
    }
}

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" for structured output, anything else for human readable logs
    pub log_format: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        }
    }
}

/// Resolve a shared data path such as the templates directory.
///
/// Absolute paths are returned as is. Relative paths are joined with each
/// search dir in turn and the first existing one wins; when none exists the
/// path relative to `config_dir` is returned. An empty name resolves to
/// nothing.
pub fn resolve_shared_data_path<P: AsRef<Path>>(
    name: &str,
    config_dir: &Path,
    search_dirs: &[P],
) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let path = Path::new(name);
    if path.is_absolute() {
        return Some(path.to_path_buf());
    }

    let mut candidates: Vec<&Path> = vec![config_dir];
    for dir in search_dirs {
        let dir = dir.as_ref();
        if !candidates.contains(&dir) {
            candidates.push(dir);
        }
    }

    candidates
        .into_iter()
        .map(|base| base.join(path))
        .find(|candidate| candidate.exists())
        .or_else(|| Some(config_dir.join(path)))
}
