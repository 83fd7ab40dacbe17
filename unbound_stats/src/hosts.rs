//! Host list: `address:port:name:flag` entries separated by commas.
//! Parsed once at startup into immutable [`HostTarget`]s.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;
use crate::tls::{resolve_credentials, Credentials};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EncryptionMode {
    /// Plain TCP (`N`).
    None,
    /// One shared cert/key set in the config root (`G`).
    Global,
    /// A cert/key set per host in `config_root/<name>/` (`S`).
    PerHost,
}

impl EncryptionMode {
    pub fn flag(&self) -> &'static str {
        match self {
            EncryptionMode::None => "N",
            EncryptionMode::Global => "G",
            EncryptionMode::PerHost => "S",
        }
    }
}

impl FromStr for EncryptionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(EncryptionMode::None),
            "G" => Ok(EncryptionMode::Global),
            "S" => Ok(EncryptionMode::PerHost),
            other => Err(ConfigError::InvalidEncryptionFlag {
                flag: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// One resolver endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HostTarget {
    pub address: String,
    pub port: u16,
    pub display_name: String,
    pub encryption: EncryptionMode,
    // None exactly when encryption is None
    pub credentials: Option<Credentials>,
}

impl HostTarget {
    /// Builds a target, resolving and checking its credential files under `config_root`.
    pub fn new(
        address: &str,
        port: &str,
        display_name: &str,
        flag: &str,
        config_root: &Path,
    ) -> Result<Self, ConfigError> {
        let port = match port.parse::<u16>() {
            Ok(p) if p != 0 => p,
            _ => {
                return Err(ConfigError::InvalidPort {
                    host: address.to_string(),
                    port: port.to_string(),
                })
            }
        };
        let encryption: EncryptionMode = flag.parse()?;
        let credentials = resolve_credentials(encryption, display_name, config_root)?;
        Ok(HostTarget {
            address: address.to_string(),
            port,
            display_name: display_name.to_string(),
            encryption,
            credentials,
        })
    }
}

/// `host:port[ENC:flag](name)`, the form used in every log line about a host.
impl fmt::Display for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}[ENC:{}]({})",
            self.address, self.port, self.encryption, self.display_name
        )
    }
}

/// Parses the full host list, in order. Any bad entry fails the whole list.
pub fn parse_host_list(list: &str, config_root: &Path) -> Result<Vec<HostTarget>, ConfigError> {
    list.split(',')
        .map(|entry| {
            let fields: Vec<&str> = entry.trim().split(':').collect();
            match fields.as_slice() {
                [address, port, name, flag] if !address.is_empty() && !name.is_empty() => {
                    HostTarget::new(address, port, name, flag, config_root)
                }
                _ => Err(ConfigError::MalformedHostEntry {
                    entry: entry.to_string(),
                }),
            }
        })
        .collect()
}
