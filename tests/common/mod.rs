//! Common test utilities
//!
//! Provides a scripted SMTP server that records what clients send, and
//! helpers to lay out template directories.
#![allow(dead_code)] // Not every helper is used by every test binary

use auth9_mailer::SmtpConfig;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// Challenge from the RFC 2195 example exchange
pub const CRAM_CHALLENGE: &str = "<1896.697170952@postoffice.reston.mci.net>";

/// Reset template used by the tests
pub const RESET_TEMPLATE: &str =
    r#"<p>Hello {{ username }}</p><a href="{{ reset_link }}">Reset password</a>"#;

/// SMTP command received by the scripted server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    Auth(String),
    /// Line sent in reply to an AUTH challenge
    AuthResponse(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Message content (after DATA)
    MessageContent(String),
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
struct ServerScript {
    auth_mechanisms: String,
    auth_reply: u16,
    rcpt_reply: u16,
    greeting_delay: Option<Duration>,
    /// Never acknowledge the end of DATA
    stall_after_data: bool,
    /// Never answer QUIT
    stall_on_quit: bool,
}

impl Default for ServerScript {
    fn default() -> Self {
        Self {
            auth_mechanisms: "PLAIN LOGIN CRAM-MD5".to_string(),
            auth_reply: 235,
            rcpt_reply: 250,
            greeting_delay: None,
            stall_after_data: false,
            stall_on_quit: false,
        }
    }
}

/// In-process SMTP server speaking just enough of the protocol for lettre
pub struct ScriptedSmtpServer {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<SmtpCommand>>>,
    connections: Arc<Mutex<usize>>,
}

/// Builder for [`ScriptedSmtpServer`]
#[derive(Default)]
pub struct ScriptedSmtpServerBuilder {
    script: ServerScript,
}

impl ScriptedSmtpServerBuilder {
    pub fn with_auth_reply(mut self, code: u16) -> Self {
        self.script.auth_reply = code;
        self
    }

    pub fn with_rcpt_reply(mut self, code: u16) -> Self {
        self.script.rcpt_reply = code;
        self
    }

    pub fn with_greeting_delay(mut self, delay: Duration) -> Self {
        self.script.greeting_delay = Some(delay);
        self
    }

    pub fn with_stall_after_data(mut self) -> Self {
        self.script.stall_after_data = true;
        self
    }

    pub fn with_stall_on_quit(mut self) -> Self {
        self.script.stall_on_quit = true;
        self
    }

    pub async fn start(self) -> ScriptedSmtpServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let script = Arc::new(self.script);
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(Mutex::new(0));

        let commands_clone = Arc::clone(&commands);
        let connections_clone = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((stream, _peer)) = listener.accept().await {
                *connections_clone.lock().await += 1;
                let script = Arc::clone(&script);
                let commands = Arc::clone(&commands_clone);
                tokio::spawn(async move {
                    let _ = handle_client(stream, script, commands).await;
                });
            }
        });

        ScriptedSmtpServer {
            addr,
            commands,
            connections,
        }
    }
}

impl ScriptedSmtpServer {
    pub fn builder() -> ScriptedSmtpServerBuilder {
        ScriptedSmtpServerBuilder::default()
    }

    pub async fn start() -> Self {
        Self::builder().start().await
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands.lock().await.clone()
    }

    pub async fn connection_count(&self) -> usize {
        *self.connections.lock().await
    }

    /// Message bodies received after DATA, in order
    pub async fn messages(&self) -> Vec<String> {
        self.commands()
            .await
            .into_iter()
            .filter_map(|cmd| match cmd {
                SmtpCommand::MessageContent(content) => Some(content),
                _ => None,
            })
            .collect()
    }

    /// SMTP config pointing at this server, without TLS
    pub fn smtp_config(&self) -> SmtpConfig {
        SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: i64::from(self.port()),
            ..Default::default()
        }
    }
}

async fn handle_client(
    mut stream: TcpStream,
    script: Arc<ServerScript>,
    commands: Arc<Mutex<Vec<SmtpCommand>>>,
) -> std::io::Result<()> {
    if let Some(delay) = script.greeting_delay {
        tokio::time::sleep(delay).await;
    }

    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    writer.write_all(b"220 mock.local ESMTP ready\r\n").await?;

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }

        let cmd_line = line.trim_end().to_string();
        let (verb, arg) = match cmd_line.split_once(' ') {
            Some((verb, arg)) => (verb.to_uppercase(), arg.to_string()),
            None => (cmd_line.to_uppercase(), String::new()),
        };

        let reply = match verb.as_str() {
            "EHLO" => {
                commands.lock().await.push(SmtpCommand::Ehlo(arg));
                format!(
                    "250-mock.local\r\n250-AUTH {}\r\n250 8BITMIME\r\n",
                    script.auth_mechanisms
                )
            }
            "AUTH" => {
                commands.lock().await.push(SmtpCommand::Auth(arg.clone()));
                let mechanism = arg.split(' ').next().unwrap_or_default().to_uppercase();
                let cram = encode(CRAM_CHALLENGE);
                let mut challenges: Vec<&str> = Vec::new();
                match mechanism.as_str() {
                    "CRAM-MD5" => challenges.push(&cram),
                    "LOGIN" => {
                        challenges.push("VXNlcm5hbWU6");
                        challenges.push("UGFzc3dvcmQ6");
                    }
                    _ => {}
                }
                for challenge in challenges {
                    writer
                        .write_all(format!("334 {}\r\n", challenge).as_bytes())
                        .await?;
                    line.clear();
                    reader.read_line(&mut line).await?;
                    commands
                        .lock()
                        .await
                        .push(SmtpCommand::AuthResponse(line.trim_end().to_string()));
                }
                match script.auth_reply {
                    235 => "235 2.7.0 Authentication successful\r\n".to_string(),
                    code => format!("{} 5.7.8 Authentication credentials invalid\r\n", code),
                }
            }
            "MAIL" => {
                commands.lock().await.push(SmtpCommand::MailFrom(arg));
                "250 2.1.0 Ok\r\n".to_string()
            }
            "RCPT" => {
                commands.lock().await.push(SmtpCommand::RcptTo(arg));
                match script.rcpt_reply {
                    250 => "250 2.1.5 Ok\r\n".to_string(),
                    code => format!("{} 5.1.1 Recipient rejected\r\n", code),
                }
            }
            "DATA" => {
                commands.lock().await.push(SmtpCommand::Data);
                writer
                    .write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n")
                    .await?;

                let mut content = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await? == 0 {
                        return Ok(());
                    }
                    if line.trim_end() == "." {
                        break;
                    }
                    content.push_str(&line);
                }
                commands
                    .lock()
                    .await
                    .push(SmtpCommand::MessageContent(content));
                if script.stall_after_data {
                    std::future::pending::<()>().await;
                }
                "250 2.0.0 Ok: queued\r\n".to_string()
            }
            "QUIT" => {
                commands.lock().await.push(SmtpCommand::Quit);
                if script.stall_on_quit {
                    std::future::pending::<()>().await;
                }
                writer.write_all(b"221 2.0.0 Bye\r\n").await?;
                return Ok(());
            }
            "RSET" | "NOOP" => "250 2.0.0 Ok\r\n".to_string(),
            _ => {
                commands.lock().await.push(SmtpCommand::Other(cmd_line.clone()));
                "500 5.5.2 Error: command not recognized\r\n".to_string()
            }
        };

        writer.write_all(reply.as_bytes()).await?;
    }
}

fn encode(value: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(value)
}

/// Config dir containing `templates/email/reset-password.html`
pub fn config_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let email_dir = dir.path().join("templates").join("email");
    fs::create_dir_all(&email_dir).unwrap();
    fs::write(email_dir.join("reset-password.html"), RESET_TEMPLATE).unwrap();
    dir
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
