//! Email sending functionality
//!
//! This module provides the building blocks used by the mailer service:
//! - SMTP client descriptor and sessions (using lettre)
//! - CRAM-MD5 authentication
//! - Message composition with attachments
//! - File based email templates (using tera)

pub mod client;
pub mod cram_md5;
pub mod message;
pub mod templates;

pub use client::{SmtpAuth, SmtpClient, SmtpEncryption, SmtpSession};
pub use message::{Attachment, EmailContentType, EmailDraft};
pub use templates::{EmailTemplate, TemplateStore};
