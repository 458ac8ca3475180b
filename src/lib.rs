//! Auth9 Mailer - outbound email delivery
//!
//! This crate validates SMTP settings, renders email templates and sends
//! messages through a remote SMTP server. The [`Mailer`] service owns the
//! active configuration; build one at startup and share it.

pub mod config;
pub mod email;
pub mod error;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use config::SmtpConfig;
pub use email::{Attachment, EmailContentType};
pub use error::{MailError, Result};
pub use service::Mailer;
