//! CRAM-MD5 authentication (RFC 2195)
//!
//! lettre only ships PLAIN, LOGIN and XOAUTH2, so the exchange is driven
//! over the raw command channel of an open connection.

use crate::error::{MailError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use lettre::transport::smtp::client::AsyncSmtpConnection;
use md5::Md5;

type HmacMd5 = Hmac<Md5>;

/// Reply code announcing a server challenge
const CHALLENGE_CODE: u16 = 334;

/// Compute the base64 encoded client reply for a decoded challenge
pub fn client_response(username: &str, password: &str, challenge: &[u8]) -> Result<String> {
    let mut mac = HmacMd5::new_from_slice(password.as_bytes())
        .map_err(|e| MailError::Authentication(e.to_string()))?;
    mac.update(challenge);
    let digest = hex::encode(mac.finalize().into_bytes());

    Ok(STANDARD.encode(format!("{} {}", username, digest)))
}

/// Decode the challenge carried by a 334 reply line
pub fn decode_challenge(line: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(line.trim())
        .map_err(|e| MailError::Authentication(format!("malformed CRAM-MD5 challenge: {}", e)))
}

/// Run the AUTH CRAM-MD5 exchange on an open connection
pub async fn authenticate(
    conn: &mut AsyncSmtpConnection,
    username: &str,
    password: &str,
) -> Result<()> {
    let reply = conn
        .command("AUTH CRAM-MD5\r\n")
        .await
        .map_err(MailError::Connection)?;

    if !reply.has_code(CHALLENGE_CODE) {
        return Err(MailError::Authentication(format!(
            "unexpected reply {} to AUTH CRAM-MD5",
            reply.code()
        )));
    }

    let challenge = decode_challenge(reply.message().next().unwrap_or_default())?;
    let response = client_response(username, password, &challenge)?;

    conn.command(format!("{}\r\n", response))
        .await
        .map_err(MailError::Connection)?;

    Ok(())
}
