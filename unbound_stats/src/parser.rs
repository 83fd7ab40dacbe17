//! Parser for the `stats` reply of an Unbound remote-control channel.
//!
//! The reply is a list of `key=value` lines, e.g.
//!
//! ```text
//! total.num.queries=134
//! total.num.cachehits=63
//! total.requestlist.avg=4.61333
//! total.recursion.time.median=6.6
//! time.up=166.173221
//! ```
//!
//! Only `total.*` counters and `time.up` are kept. Names are flattened to
//! `num_queries`, `requestlist_avg`, ... and a `percent_cachehits` ratio is derived.

use crate::error::ParseError;
use crate::types::{MetricSet, MetricValue};

/// Prefix of the aggregated (all threads) counters.
const TOTAL_PREFIX: &str = "total";
/// Number of characters dropped from a `total.*` key (`total.`).
const TOTAL_PREFIX_LEN: usize = 6;
const UPTIME_KEY: &str = "time.up";

pub const UPTIME_FIELD: &str = "uptime";
pub const PERCENT_CACHEHITS_FIELD: &str = "percent_cachehits";

/// Some Unbound builds report `num.zero_ttl`, others `num.expired`, for the same counter.
pub const ZERO_TTL_SUFFIX: &str = "zero_ttl";
pub const EXPIRED_SUFFIX: &str = "expired";

const FLOAT_SUFFIXES: [&str; 2] = ["avg", "median"];
const QUERIES_SUFFIX: &str = "queries";
const CACHEHITS_SUFFIX: &str = "cachehits";

/// One `key=value` line, borrowed from the response text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatLine<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl<'a> StatLine<'a> {
    /// Splits on the first `=` only; any further `=` stays in the value.
    pub fn parse(line: &'a str) -> Result<Self, ParseError> {
        match line.split_once('=') {
            Some((key, value)) => Ok(StatLine {
                key: key.trim(),
                value: value.trim(),
            }),
            None => Err(ParseError::MalformedLine {
                line: line.to_string(),
            }),
        }
    }
}

/// Flattens a `total.*` key: drops the prefix and turns dots into underscores.
pub fn normalize_total_key(key: &str) -> String {
    key.get(TOTAL_PREFIX_LEN..).unwrap_or("").replace('.', "_")
}

/// Applies the `zero_ttl` -> `expired` alias to a normalized name.
pub fn alias_field(name: &str) -> String {
    match name.strip_suffix(ZERO_TTL_SUFFIX) {
        Some(stem) => format!("{stem}{EXPIRED_SUFFIX}"),
        None => name.to_string(),
    }
}

fn is_float_field(name: &str) -> bool {
    FLOAT_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn parse_int(key: &str, value: &str) -> Result<i64, ParseError> {
    value.parse::<i64>().map_err(|_| ParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_float(key: &str, value: &str) -> Result<f64, ParseError> {
    value.parse::<f64>().map_err(|_| ParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Cache hit ratio in percent, 0.0 when nothing was queried.
pub fn percent_cachehits(total_queries: i64, total_cachehits: i64) -> f64 {
    if total_queries == 0 {
        return 0.0;
    }
    (total_cachehits as f64 / total_queries as f64 * 100.0).clamp(0.0, 100.0)
}

/// Turns a whole `stats` reply into a [`MetricSet`].
///
/// Stops at the first bad line; nothing is salvaged from a reply that fails.
/// Blank lines (the reply always ends with a newline) are skipped.
pub fn normalize(response: &str) -> Result<MetricSet, ParseError> {
    let mut stats = MetricSet::new();
    let mut total_queries: i64 = 0;
    let mut total_cachehits: i64 = 0;

    for raw in response.lines() {
        if raw.trim().is_empty() {
            continue;
        }
        let line = StatLine::parse(raw)?;

        if line.key.starts_with(TOTAL_PREFIX) {
            let name = normalize_total_key(line.key);
            // bare `total=..` has no field name to report under
            if name.is_empty() {
                continue;
            }
            if is_float_field(&name) {
                let v = parse_float(line.key, line.value)?;
                stats.insert(name, MetricValue::Float(v));
                continue;
            }

            let v = parse_int(line.key, line.value)?;
            let name = if name.ends_with(ZERO_TTL_SUFFIX) {
                alias_field(&name)
            } else {
                if name.ends_with(QUERIES_SUFFIX) {
                    total_queries = v;
                } else if name.ends_with(CACHEHITS_SUFFIX) {
                    total_cachehits = v;
                }
                name
            };
            stats.insert(name, MetricValue::Int(v));
        } else if line.key == UPTIME_KEY {
            let v = parse_float(line.key, line.value)?;
            stats.insert(UPTIME_FIELD.to_string(), MetricValue::Float(v));
        }
    }

    stats.insert(
        PERCENT_CACHEHITS_FIELD.to_string(),
        MetricValue::Float(percent_cachehits(total_queries, total_cachehits)),
    );
    Ok(stats)
}
