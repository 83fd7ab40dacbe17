//! Publishing metric sets: InfluxDB 2 line protocol over HTTP, or stdout in test mode.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tracing::debug;

use crate::error::PublishError;
use crate::hosts::HostTarget;
use crate::types::{MetricSet, MetricValue};

pub const MEASUREMENT: &str = "stats";

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, target: &HostTarget, stats: &MetricSet) -> Result<(), PublishError>;
}

/// Connection settings for the InfluxDB 2 write API.
#[derive(Debug, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub port: u16,
    pub organization: String,
    pub bucket: String,
    pub token: String,
    pub service_tag: String,
    pub timeout: Duration,
}

pub struct InfluxWriter {
    client: reqwest::Client,
    write_url: String,
    settings: InfluxSettings,
}

impl InfluxWriter {
    pub fn new(settings: InfluxSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        let write_url = format!("http://{}:{}/api/v2/write", settings.host, settings.port);
        Ok(Self {
            client,
            write_url,
            settings,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }
}

#[async_trait]
impl Publisher for InfluxWriter {
    async fn publish(&self, target: &HostTarget, stats: &MetricSet) -> Result<(), PublishError> {
        let body = line_protocol(&target.display_name, &self.settings.service_tag, stats);
        debug!(host = %target, endpoint = %self.endpoint(), "uploading stats");

        let resp = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.settings.organization.as_str()),
                ("bucket", self.settings.bucket.as_str()),
                ("precision", "s"),
            ])
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.settings.token),
            )
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_else(|e| e.to_string());
        Err(PublishError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn classify(e: reqwest::Error) -> PublishError {
    if e.is_timeout() {
        PublishError::Timeout
    } else {
        PublishError::Transport(e.to_string())
    }
}

/// Test mode: pretty-print instead of uploading.
#[derive(Debug, Default, Clone)]
pub struct StdoutPrinter;

#[async_trait]
impl Publisher for StdoutPrinter {
    async fn publish(&self, target: &HostTarget, stats: &MetricSet) -> Result<(), PublishError> {
        let json = serde_json::to_string_pretty(stats)
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        println!(
            "\n[{}] Stats for host {target}: ",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        println!("{json}");
        Ok(())
    }
}

fn escape(s: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

/// One InfluxDB line-protocol record: `stats,host=..,service=.. f1=1i,f2=0.5`.
/// Non-finite floats are dropped, the protocol cannot carry them.
pub fn line_protocol(host: &str, service: &str, stats: &MetricSet) -> String {
    let mut line = format!(
        "{},host={},service={} ",
        escape(MEASUREMENT, &[',', ' ']),
        escape_key(host),
        escape_key(service)
    );
    let mut first = true;
    for (name, value) in stats {
        let rendered = match value {
            MetricValue::Int(v) => format!("{v}i"),
            MetricValue::Float(v) if v.is_finite() => format!("{v}"),
            MetricValue::Float(_) => continue,
        };
        if !first {
            line.push(',');
        }
        first = false;
        let _ = write!(line, "{}={}", escape_key(name), rendered);
    }
    line
}
