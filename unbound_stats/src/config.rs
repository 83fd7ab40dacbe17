//! Command line + environment configuration, resolved once at startup into [`Config`].
//!
//! Every flag falls back to the environment variable the container images set
//! (`UNBOUND_HOSTS`, `INFLUX_HOST`, ...), so both `--hosts ...` and `UNBOUND_HOSTS=...`
//! work.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::error::ConfigError;
use crate::hosts::{parse_host_list, HostTarget};
use crate::publish::InfluxSettings;

pub const DEFAULT_HEALTHCHECK_FILE: &str = "healthcheck";

#[derive(Debug, Parser)]
#[command(
    name = "unbound_stats",
    version,
    about = "UnBound Stats to influxdb2 uploader"
)]
pub struct Cli {
    /// Just print the results without uploading to influxdb2
    #[arg(short, long)]
    pub test: bool,

    /// Comma separated address:port:name:flag entries, flag is N, G or S
    #[arg(long, env = "UNBOUND_HOSTS")]
    pub hosts: String,

    /// Directory holding unbound_server.pem, unbound_control.pem and unbound_control.key
    #[arg(long, env = "CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    /// Seconds between the start of two poll cycles
    #[arg(long, env = "RUN_EVERY_SECONDS", default_value_t = 60)]
    pub run_every_seconds: u64,

    /// Debug logging; `VERBOSE` is on for any casing of `true`, off for anything else
    #[arg(short, long, env = "VERBOSE", action = ArgAction::SetTrue, value_parser = verbose_flag)]
    pub verbose: bool,

    #[arg(long, env = "INFLUX_HOST")]
    pub influx_host: Option<String>,

    #[arg(long, env = "INFLUX_PORT", default_value_t = 8086)]
    pub influx_port: u16,

    #[arg(long, env = "INFLUX_ORGANIZATION")]
    pub influx_organization: Option<String>,

    #[arg(long, env = "INFLUX_BUCKET")]
    pub influx_bucket: Option<String>,

    #[arg(long, env = "INFLUX_TOKEN", hide_env_values = true)]
    pub influx_token: Option<String>,

    /// Value of the `service` tag on every record
    #[arg(long, env = "INFLUX_SERVICE_TAG", default_value = "unbound")]
    pub influx_service_tag: String,

    /// Health flag file (default: `healthcheck` next to the executable)
    #[arg(long, env = "HEALTHCHECK_FILE")]
    pub healthcheck_file: Option<PathBuf>,

    /// Per-host limit for connecting and reading the stats reply
    #[arg(long, env = "COLLECT_TIMEOUT_SECONDS", default_value_t = 10)]
    pub collect_timeout_seconds: u64,

    #[arg(long, env = "PUBLISH_TIMEOUT_SECONDS", default_value_t = 10)]
    pub publish_timeout_seconds: u64,
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub hosts: Vec<HostTarget>,
    pub cadence: Duration,
    pub test_mode: bool,
    // None in test mode
    pub influx: Option<InfluxSettings>,
    pub healthcheck_file: PathBuf,
    pub collect_timeout: Duration,
}

fn verbose_flag(value: &str) -> Result<bool, String> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingSetting(name))
}

fn default_healthcheck_file() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_HEALTHCHECK_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HEALTHCHECK_FILE))
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.run_every_seconds == 0 {
            return Err(ConfigError::InvalidCadence);
        }
        let hosts = parse_host_list(&cli.hosts, &cli.config_dir)?;

        let influx = if cli.test {
            None
        } else {
            Some(InfluxSettings {
                host: required(cli.influx_host, "INFLUX_HOST")?,
                port: cli.influx_port,
                organization: required(cli.influx_organization, "INFLUX_ORGANIZATION")?,
                bucket: required(cli.influx_bucket, "INFLUX_BUCKET")?,
                token: required(cli.influx_token, "INFLUX_TOKEN")?,
                service_tag: cli.influx_service_tag,
                timeout: Duration::from_secs(cli.publish_timeout_seconds),
            })
        };

        Ok(Config {
            hosts,
            cadence: Duration::from_secs(cli.run_every_seconds),
            test_mode: cli.test,
            influx,
            healthcheck_file: cli
                .healthcheck_file
                .unwrap_or_else(default_healthcheck_file),
            collect_timeout: Duration::from_secs(cli.collect_timeout_seconds),
        })
    }
}
