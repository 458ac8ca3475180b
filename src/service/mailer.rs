//! Mailer service: configuration lifecycle, template rendering and sending

use crate::config::{resolve_shared_data_path, SmtpConfig, SHARED_DATA_DIRS};
use crate::email::templates::TEMPLATE_EMAIL_DIR;
use crate::email::{Attachment, EmailContentType, EmailDraft, EmailTemplate, SmtpClient, TemplateStore};
use crate::error::{MailError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Everything a configured mailer needs to render and send
#[derive(Debug)]
struct MailerState {
    client: SmtpClient,
    from: String,
    templates: TemplateStore,
}

/// Service for sending emails
///
/// Construct one per process and share it (e.g. `Arc<Mailer>`). Until
/// [`Mailer::initialize`] succeeds with a non-empty host, every render and
/// send fails with [`MailError::NotConfigured`].
///
/// Sends snapshot the current state, so an in-flight send finishes with the
/// settings it started with even if the mailer is re-initialized meanwhile.
#[derive(Debug)]
pub struct Mailer {
    state: RwLock<Option<Arc<MailerState>>>,
    shared_data_dirs: Vec<PathBuf>,
}

impl Default for Mailer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailer {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
            shared_data_dirs: SHARED_DATA_DIRS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Replace the system-wide directories searched for relative template paths
    pub fn with_shared_data_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.shared_data_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if an SMTP server is configured
    pub fn is_enabled(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Snapshot of the current SMTP client settings
    pub fn client(&self) -> Option<SmtpClient> {
        self.current().ok().map(|state| state.client.clone())
    }

    /// Validate `config` and make it the active configuration.
    ///
    /// The previous configuration is dropped first: an empty host disables
    /// email and any error leaves the mailer disabled.
    pub fn initialize(&self, config: &SmtpConfig, config_dir: impl AsRef<Path>) -> Result<()> {
        self.replace(None);

        if !config.is_enabled() {
            tracing::debug!("smtp configuration disabled, email capabilities will not be available");
            return Ok(());
        }

        config.validate()?;

        let templates_path = resolve_shared_data_path(
            &config.templates_path,
            config_dir.as_ref(),
            self.shared_data_dirs.as_slice(),
        )
        .ok_or_else(|| MailError::InvalidTemplatesPath(config.templates_path.clone()))?;
        let templates = TemplateStore::load(&templates_path.join(TEMPLATE_EMAIL_DIR))?;

        let client = SmtpClient::from_config(config)?;

        tracing::debug!(
            host = %client.host(),
            port = client.port(),
            username = %client.username(),
            auth = %client.auth(),
            encryption = %client.encryption(),
            helo = %client.helo(),
            "smtp configuration successfully initialized"
        );

        self.replace(Some(MailerState {
            client,
            from: config.from.clone(),
            templates,
        }));
        Ok(())
    }

    /// Render the password reset template into `out`
    pub fn render_password_reset_template<T, W>(&self, out: W, data: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
        W: Write,
    {
        let state = self.current()?;
        state
            .templates
            .render_to(EmailTemplate::PasswordReset, data, out)
    }

    /// Render the password reset template into a string
    pub fn render_password_reset<T>(&self, data: &T) -> Result<String>
    where
        T: Serialize + ?Sized,
    {
        let state = self.current()?;
        state.templates.render(EmailTemplate::PasswordReset, data)
    }

    /// Send an email to every address in `to`.
    ///
    /// The message is composed and checked before connecting, so malformed
    /// addresses never reach the network. One connection is opened per call
    /// and closed afterwards. Nothing is retried.
    pub async fn send_email(
        &self,
        to: &[String],
        subject: &str,
        body: &str,
        content_type: EmailContentType,
        attachments: &[Attachment],
    ) -> Result<()> {
        let state = self.current()?;

        let from = if state.from.is_empty() {
            state.client.username()
        } else {
            state.from.as_str()
        };
        let message = EmailDraft {
            from,
            to,
            subject,
            body,
            content_type,
            attachments,
        }
        .compose()?;

        let session = state.client.connect().await?;
        session.send(&message).await?;

        tracing::debug!(recipients = to.len(), subject, "email sent");
        Ok(())
    }

    /// Render the password reset template and send it as HTML
    pub async fn send_password_reset<T>(&self, to: &[String], data: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let body = self.render_password_reset(data)?;
        self.send_email(
            to,
            EmailTemplate::PasswordReset.subject(),
            &body,
            EmailContentType::TextHtml,
            &[],
        )
        .await
    }

    /// Test the configuration by opening and closing a session
    pub async fn test_connection(&self) -> Result<()> {
        let state = self.current()?;
        let session = state.client.connect().await?;
        session.quit().await;
        Ok(())
    }

    fn current(&self) -> Result<Arc<MailerState>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(MailError::NotConfigured)
    }

    fn replace(&self, state: Option<MailerState>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state.map(Arc::new);
    }
}
