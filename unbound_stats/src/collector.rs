//! Per-host collection: one `stats` round trip, parsed into a [`MetricSet`].
//!
//! [`MetricSet`]: crate::types::MetricSet

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::control::{StatsSource, STATS_COMMAND};
use crate::error::{CollectError, ControlError};
use crate::hosts::HostTarget;
use crate::parser::normalize;
use crate::types::CollectionOutcome;

pub struct HostCollector {
    source: Arc<dyn StatsSource>,
    timeout: Duration,
}

impl HostCollector {
    pub fn new(source: Arc<dyn StatsSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Polls one host once. Never fails outright; errors become `Failure`.
    /// No retry here, the next cycle is the retry.
    pub async fn collect(&self, target: &HostTarget) -> CollectionOutcome {
        debug!(host = %target, "collecting stats");

        let reply = match timeout(self.timeout, self.source.send_command(target, STATS_COMMAND))
            .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return CollectionOutcome::Failure(CollectError::Connection(e)),
            Err(_) => {
                return CollectionOutcome::Failure(CollectError::Connection(
                    ControlError::Timeout(self.timeout),
                ))
            }
        };

        match normalize(&reply) {
            Ok(stats) => CollectionOutcome::Success(stats),
            Err(e) => CollectionOutcome::Failure(CollectError::Protocol(e)),
        }
    }
}
