//! Unified error handling for the mailer

use std::time::Duration;
use thiserror::Error;

/// Mailer-wide result type
pub type Result<T> = std::result::Result<T, MailError>;

/// Mailer error types
#[derive(Error, Debug)]
pub enum MailError {
    #[error("smtp: not configured")]
    NotConfigured,

    #[error("smtp: invalid port {0}")]
    InvalidPort(i64),

    #[error("smtp: invalid auth type {0}")]
    InvalidAuthType(i64),

    #[error("smtp: invalid encryption {0}")]
    InvalidEncryption(i64),

    #[error("smtp: invalid templates path {0:?}")]
    InvalidTemplatesPath(String),

    #[error("smtp: unable to load template {name:?}: {source}")]
    TemplateLoad {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("smtp: unable to render template {name:?}: {source}")]
    TemplateRender {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("smtp: unable to connect: {0}")]
    Connection(#[source] lettre::transport::smtp::Error),

    #[error("smtp: unable to connect: timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("smtp: authentication failed: {0}")]
    Authentication(String),

    #[error("smtp: unsupported body content type {0}")]
    UnsupportedContentType(String),

    #[error("smtp: email error: {0}")]
    Message(String),

    #[error("smtp: send failed: {0}")]
    Send(#[source] lettre::transport::smtp::Error),

    #[error("smtp: send timed out after {0:?}")]
    SendTimeout(Duration),
}
