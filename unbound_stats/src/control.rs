//! Minimal Unbound remote-control client: connect, send one command, read the reply.
//!
//! Wire format: the client writes `UBCT1 <command>\n` and the daemon streams the
//! reply until it closes the connection.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::ControlError;
use crate::hosts::HostTarget;
use crate::tls::client_config;

const CONTROL_VERSION: &str = "UBCT1";
// Name sent in SNI; the pinned-cert verifier does not check it.
const TLS_SERVER_NAME: &str = "unbound";

pub const STATS_COMMAND: &str = "stats";
/// Upper bound on a reply; a full `stats` dump is a few KiB.
pub const MAX_REPLY_BYTES: u64 = 1024 * 1024;

/// Anything that can run a control command against a host and return its raw reply.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn send_command(&self, target: &HostTarget, command: &str)
        -> Result<String, ControlError>;
}

/// Real client over TCP, with TLS when the host carries credentials.
#[derive(Debug, Default, Clone)]
pub struct RemoteControl;

impl RemoteControl {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StatsSource for RemoteControl {
    async fn send_command(
        &self,
        target: &HostTarget,
        command: &str,
    ) -> Result<String, ControlError> {
        let tcp = TcpStream::connect((target.address.as_str(), target.port)).await?;
        tcp.set_nodelay(true)?;

        match &target.credentials {
            None => {
                debug!(host = %target, "plain control channel");
                let mut stream = tcp;
                exchange(&mut stream, command).await
            }
            Some(creds) => {
                debug!(host = %target, "tls control channel");
                let connector = TlsConnector::from(Arc::new(client_config(creds)?));
                let name = ServerName::try_from(TLS_SERVER_NAME)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                let mut stream = connector.connect(name, tcp).await?;
                exchange(&mut stream, command).await
            }
        }
    }
}

/// Writes one command and reads the reply to EOF.
pub async fn exchange<S>(stream: &mut S, command: &str) -> Result<String, ControlError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(format!("{CONTROL_VERSION} {command}\n").as_bytes())
        .await?;
    stream.flush().await?;

    let mut buf = Vec::new();
    let mut limited = (&mut *stream).take(MAX_REPLY_BYTES + 1);
    if let Err(e) = limited.read_to_end(&mut buf).await {
        // Unbound may close without a TLS close_notify once the reply is complete.
        if e.kind() != io::ErrorKind::UnexpectedEof || buf.is_empty() {
            return Err(e.into());
        }
    }
    if buf.len() as u64 > MAX_REPLY_BYTES {
        return Err(ControlError::ReplyTooLarge(MAX_REPLY_BYTES));
    }

    let reply = String::from_utf8_lossy(&buf).into_owned();
    if reply.starts_with("error") {
        return Err(ControlError::Remote(reply.trim().to_string()));
    }
    Ok(reply)
}
