//! SMTP client descriptor using lettre
//!
//! A [`SmtpClient`] holds resolved connection settings. Every send opens a
//! fresh [`SmtpSession`]; connections are never pooled or reused.

use super::cram_md5;
use crate::config::SmtpConfig;
use crate::error::{MailError, Result};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;
use std::fmt;
use std::time::Duration;

/// Upper bound for connect, TLS negotiation, EHLO and authentication
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the MAIL/RCPT/DATA exchange of one message
pub const SEND_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound for waiting on the reply to QUIT
pub const QUIT_TIMEOUT: Duration = Duration::from_secs(5);

/// HELO name used when no domain is configured
pub const DEFAULT_HELO: &str = "localhost";

/// SMTP authentication mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpAuth {
    None,
    Plain,
    Login,
    CramMd5,
}

impl SmtpAuth {
    /// Map the configured auth type; no credentials means no authentication
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        if config.user.is_empty() && config.password.is_empty() {
            return Ok(Self::None);
        }
        match config.auth_type {
            0 => Ok(Self::Plain),
            1 => Ok(Self::Login),
            2 => Ok(Self::CramMd5),
            other => Err(MailError::InvalidAuthType(other)),
        }
    }
}

impl fmt::Display for SmtpAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
        })
    }
}

/// Transport encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpEncryption {
    None,
    /// TLS from the first byte (SMTPS)
    Tls,
    /// Plaintext connection upgraded with STARTTLS
    StartTls,
}

impl TryFrom<i64> for SmtpEncryption {
    type Error = MailError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Tls),
            2 => Ok(Self::StartTls),
            other => Err(MailError::InvalidEncryption(other)),
        }
    }
}

impl fmt::Display for SmtpEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Tls => "TLS",
            Self::StartTls => "STARTTLS",
        })
    }
}

/// Resolved SMTP connection settings
#[derive(Clone)]
pub struct SmtpClient {
    host: String,
    port: u16,
    username: String,
    password: String,
    auth: SmtpAuth,
    encryption: SmtpEncryption,
    helo: String,
    keep_alive: bool,
    connect_timeout: Duration,
    send_timeout: Duration,
    quit_timeout: Duration,
}

impl SmtpClient {
    /// Create a client from an already validated configuration
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let port = u16::try_from(config.port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or(MailError::InvalidPort(config.port))?;

        let helo = if config.domain.is_empty() {
            DEFAULT_HELO.to_string()
        } else {
            config.domain.clone()
        };

        Ok(Self {
            host: config.host.clone(),
            port,
            username: config.user.clone(),
            password: config.password.clone(),
            auth: SmtpAuth::from_config(config)?,
            encryption: SmtpEncryption::try_from(config.encryption)?,
            helo,
            keep_alive: false,
            connect_timeout: CONNECT_TIMEOUT,
            send_timeout: SEND_TIMEOUT,
            quit_timeout: QUIT_TIMEOUT,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn auth(&self) -> SmtpAuth {
        self.auth
    }

    pub fn encryption(&self) -> SmtpEncryption {
        self.encryption
    }

    pub fn helo(&self) -> &str {
        &self.helo
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    pub fn quit_timeout(&self) -> Duration {
        self.quit_timeout
    }

    /// Override both timeouts
    pub fn with_timeouts(mut self, connect: Duration, send: Duration) -> Self {
        self.connect_timeout = connect;
        self.send_timeout = send;
        self
    }

    /// Override how long closing a session may wait for the server
    pub fn with_quit_timeout(mut self, timeout: Duration) -> Self {
        self.quit_timeout = timeout;
        self
    }

    /// Open a new session: connect, negotiate TLS, EHLO and authenticate
    pub async fn connect(&self) -> Result<SmtpSession> {
        match tokio::time::timeout(self.connect_timeout, self.open()).await {
            Ok(result) => result,
            Err(_) => Err(MailError::ConnectTimeout(self.connect_timeout)),
        }
    }

    async fn open(&self) -> Result<SmtpSession> {
        let hello_name = ClientId::Domain(self.helo.clone());
        let wrapper_tls = match self.encryption {
            SmtpEncryption::Tls => Some(self.tls_parameters()?),
            SmtpEncryption::None | SmtpEncryption::StartTls => None,
        };

        let mut conn = AsyncSmtpConnection::connect_tokio1(
            (self.host.as_str(), self.port),
            None,
            &hello_name,
            wrapper_tls,
            None,
        )
        .await
        .map_err(MailError::Connection)?;

        if self.encryption == SmtpEncryption::StartTls {
            conn.starttls(self.tls_parameters()?, &hello_name)
                .await
                .map_err(MailError::Connection)?;
        }

        if let Err(e) = self.authenticate(&mut conn).await {
            conn.abort().await;
            return Err(e);
        }

        Ok(SmtpSession {
            conn,
            send_timeout: self.send_timeout,
            quit_timeout: self.quit_timeout,
        })
    }

    fn tls_parameters(&self) -> Result<TlsParameters> {
        TlsParameters::new(self.host.clone()).map_err(MailError::Connection)
    }

    async fn authenticate(&self, conn: &mut AsyncSmtpConnection) -> Result<()> {
        let mechanism = match self.auth {
            SmtpAuth::None => return Ok(()),
            SmtpAuth::CramMd5 => {
                return cram_md5::authenticate(conn, &self.username, &self.password).await;
            }
            SmtpAuth::Plain => Mechanism::Plain,
            SmtpAuth::Login => Mechanism::Login,
        };

        let credentials = Credentials::new(self.username.clone(), self.password.clone());
        conn.auth(&[mechanism], &credentials)
            .await
            .map(|_| ())
            .map_err(MailError::Connection)
    }
}

impl fmt::Debug for SmtpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpClient")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("auth", &self.auth)
            .field("encryption", &self.encryption)
            .field("helo", &self.helo)
            .field("keep_alive", &self.keep_alive)
            .field("connect_timeout", &self.connect_timeout)
            .field("send_timeout", &self.send_timeout)
            .field("quit_timeout", &self.quit_timeout)
            .finish()
    }
}

/// One authenticated SMTP connection, consumed by a single send
pub struct SmtpSession {
    conn: AsyncSmtpConnection,
    send_timeout: Duration,
    quit_timeout: Duration,
}

impl fmt::Debug for SmtpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSession")
            .field("send_timeout", &self.send_timeout)
            .field("quit_timeout", &self.quit_timeout)
            .finish_non_exhaustive()
    }
}

impl SmtpSession {
    /// Send one message and close the connection
    pub async fn send(mut self, message: &Message) -> Result<()> {
        let envelope = message.envelope();
        let raw = message.formatted();

        match tokio::time::timeout(self.send_timeout, self.conn.send(envelope, &raw)).await {
            // The server stopped answering; drop the socket without QUIT
            Err(_) => Err(MailError::SendTimeout(self.send_timeout)),
            Ok(Err(e)) => {
                self.abort().await;
                Err(MailError::Send(e))
            }
            Ok(Ok(_)) => {
                self.quit().await;
                Ok(())
            }
        }
    }

    /// Close the connection politely
    pub async fn quit(mut self) {
        match tokio::time::timeout(self.quit_timeout, self.conn.quit()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "smtp: QUIT failed"),
            Err(_) => tracing::warn!(timeout = ?self.quit_timeout, "smtp: QUIT timed out"),
        }
    }

    async fn abort(&mut self) {
        if tokio::time::timeout(self.quit_timeout, self.conn.abort())
            .await
            .is_err()
        {
            tracing::warn!(timeout = ?self.quit_timeout, "smtp: QUIT timed out");
        }
    }
}
