//! Error types. Only `ConfigError` is fatal; everything else is scoped to one host in one cycle.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("wrong UNBOUND_HOSTS entry <{entry}>, expected address:port:name:flag")]
    MalformedHostEntry { entry: String },

    #[error("wrong port <{port}> specified for host {host}")]
    InvalidPort { host: String, port: String },

    #[error("invalid encryption flag {flag}! Allowed values are N, G or S")]
    InvalidEncryptionFlag { flag: String },

    #[error("invalid file <{}> specified, check UNBOUND_HOSTS definition for device with name <{host}>", path.display())]
    MissingFile { path: PathBuf, host: String },

    #[error("missing required setting {0} (needed unless --test is given)")]
    MissingSetting(&'static str),

    #[error("poll cadence must be at least one second")]
    InvalidCadence,
}

/// A single response line that could not be turned into a metric.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed stats line <{line}>: missing '='")]
    MalformedLine { line: String },

    #[error("value <{value}> for key {key} is not a number")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("could not load {}: {reason}", path.display())]
    Pem { path: PathBuf, reason: String },

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("resolver replied with an error: {0}")]
    Remote(String),

    #[error("reply exceeds {0} bytes")]
    ReplyTooLarge(u64),
}

/// Why one host produced no metrics this cycle.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("connection error: {0}")]
    Connection(#[source] ControlError),

    #[error("protocol error: {0}")]
    Protocol(#[source] ParseError),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("timed out writing to the time-series store")]
    Timeout,

    #[error("store rejected the write with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl PublishError {
    /// Short label used in log lines, mirrors the three failure classes.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::Timeout => "TimeoutError",
            PublishError::Rejected { .. } => "InfluxDBError",
            PublishError::Transport(_) => "Connection Error",
        }
    }
}
