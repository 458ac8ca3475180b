//! Email template system
//!
//! Templates are loaded once from the `email` subdirectory of the configured
//! templates path and rendered with Tera. Templates whose name ends in
//! `.html` are HTML-escaped automatically.

use crate::error::{MailError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tera::{Context, Tera};

/// Subdirectory of the templates path that holds email templates
pub const TEMPLATE_EMAIL_DIR: &str = "email";

/// File name of the password reset template
pub const TEMPLATE_PASSWORD_RESET: &str = "reset-password.html";

/// Available email templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    /// Password reset email
    PasswordReset,
}

impl EmailTemplate {
    /// Every template that must be present for the mailer to start
    pub const ALL: [EmailTemplate; 1] = [EmailTemplate::PasswordReset];

    /// File name, also used as the registry key
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::PasswordReset => TEMPLATE_PASSWORD_RESET,
        }
    }

    /// Get the subject line for this template
    pub fn subject(&self) -> &'static str {
        match self {
            Self::PasswordReset => "Password Reset Request",
        }
    }
}

/// Compiled email templates, keyed by file name
#[derive(Debug)]
pub struct TemplateStore {
    tera: Tera,
}

impl TemplateStore {
    /// Load every [`EmailTemplate`] from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        tracing::debug!(path = %dir.display(), "loading email templates");

        let mut tera = Tera::default();
        for template in EmailTemplate::ALL {
            let name = template.file_name();
            tera.add_template_file(dir.join(name), Some(name))
                .map_err(|source| MailError::TemplateLoad {
                    name: name.to_string(),
                    source,
                })?;
        }

        Ok(Self { tera })
    }

    /// Check whether a template is registered
    pub fn contains(&self, template: EmailTemplate) -> bool {
        self.tera
            .get_template_names()
            .any(|name| name == template.file_name())
    }

    /// Render `template` with `data` as context, writing into `out`
    pub fn render_to<T, W>(&self, template: EmailTemplate, data: &T, out: W) -> Result<()>
    where
        T: Serialize + ?Sized,
        W: Write,
    {
        let name = template.file_name();
        let context = Context::from_serialize(data).map_err(|source| MailError::TemplateRender {
            name: name.to_string(),
            source,
        })?;

        self.tera
            .render_to(name, &context, out)
            .map_err(|source| MailError::TemplateRender {
                name: name.to_string(),
                source,
            })
    }

    /// Render `template` into a string
    pub fn render<T>(&self, template: EmailTemplate, data: &T) -> Result<String>
    where
        T: Serialize + ?Sized,
    {
        let mut buf = Vec::new();
        self.render_to(template, data, &mut buf)?;
        String::from_utf8(buf).map_err(|e| MailError::Message(e.to_string()))
    }
}
