//! Email message composition

use crate::error::{MailError, Result};
use lettre::message::{header::ContentType, Attachment as AttachmentPart, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported content types for the email body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailContentType {
    TextPlain,
    TextHtml,
}

impl EmailContentType {
    fn header(&self) -> ContentType {
        match self {
            Self::TextPlain => ContentType::TEXT_PLAIN,
            Self::TextHtml => ContentType::TEXT_HTML,
        }
    }
}

impl fmt::Display for EmailContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextPlain => f.write_str("text/plain"),
            Self::TextHtml => f.write_str("text/html"),
        }
    }
}

impl FromStr for EmailContentType {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text/plain" | "text_plain" | "plain" => Ok(Self::TextPlain),
            "text/html" | "text_html" | "html" => Ok(Self::TextHtml),
            _ => Err(MailError::UnsupportedContentType(s.to_string())),
        }
    }
}

impl TryFrom<i64> for EmailContentType {
    type Error = MailError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::TextPlain),
            1 => Ok(Self::TextHtml),
            other => Err(MailError::UnsupportedContentType(other.to_string())),
        }
    }
}

/// File attached to an outgoing email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the recipient, Content-ID for inline parts
    pub name: String,
    pub data: Vec<u8>,
    /// Guessed from `name` when not set
    pub mime_type: Option<String>,
    pub inline: bool,
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mime_type: None,
            inline: false,
        }
    }

    /// Attachment referenced from the HTML body as `cid:<name>`
    pub fn inline(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            inline: true,
            ..Self::new(name, data)
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    fn content_type(&self) -> Result<ContentType> {
        let mime = match &self.mime_type {
            Some(mime) => mime.clone(),
            None => mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .to_string(),
        };
        ContentType::parse(&mime).map_err(|e| {
            MailError::Message(format!(
                "invalid content type {:?} for attachment {:?}: {}",
                mime, self.name, e
            ))
        })
    }

    fn to_part(&self) -> Result<SinglePart> {
        let content_type = self.content_type()?;
        let part = if self.inline {
            AttachmentPart::new_inline(self.name.clone())
        } else {
            AttachmentPart::new(self.name.clone())
        };
        Ok(part.body(self.data.clone(), content_type))
    }
}

/// Everything needed to build one outgoing message
#[derive(Debug, Clone, Copy)]
pub struct EmailDraft<'a> {
    pub from: &'a str,
    pub to: &'a [String],
    pub subject: &'a str,
    pub body: &'a str,
    pub content_type: EmailContentType,
    pub attachments: &'a [Attachment],
}

impl EmailDraft<'_> {
    /// Build the MIME message, checking every address up front
    pub fn compose(&self) -> Result<Message> {
        if self.from.is_empty() {
            return Err(MailError::Message("missing from address".to_string()));
        }
        if self.to.is_empty() {
            return Err(MailError::Message("no recipients specified".to_string()));
        }

        let from: Mailbox = self.from.parse().map_err(|e| {
            MailError::Message(format!("invalid from address {:?}: {}", self.from, e))
        })?;

        let mut builder = Message::builder().from(from).subject(self.subject);
        for addr in self.to {
            let mailbox: Mailbox = addr.parse().map_err(|e| {
                MailError::Message(format!("invalid to address {:?}: {}", addr, e))
            })?;
            builder = builder.to(mailbox);
        }

        let body = SinglePart::builder()
            .header(self.content_type.header())
            .body(self.body.to_string());

        let message = if self.attachments.is_empty() {
            builder.singlepart(body)
        } else {
            let mut parts = MultiPart::mixed().singlepart(body);
            for attachment in self.attachments {
                parts = parts.singlepart(attachment.to_part()?);
            }
            builder.multipart(parts)
        };

        message.map_err(|e| MailError::Message(e.to_string()))
    }
}
