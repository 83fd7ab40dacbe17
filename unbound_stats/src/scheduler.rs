//! Poll loop: every cadence, collect each host in order, publish what succeeded,
//! then update the health flag.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::collector::HostCollector;
use crate::health::{HealthFile, HealthState, HealthStatus};
use crate::hosts::HostTarget;
use crate::publish::Publisher;
use crate::types::CollectionOutcome;

/// What one cycle did; returned so the loop body can be driven from tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub hosts: usize,
    pub failures: usize,
    pub transition: Option<HealthStatus>,
}

impl CycleReport {
    pub fn failed(&self) -> bool {
        self.failures > 0
    }
}

pub struct FleetScheduler {
    hosts: Vec<HostTarget>,
    collector: HostCollector,
    publisher: Arc<dyn Publisher>,
    health: HealthState,
    flag: HealthFile,
    cadence: Duration,
}

impl FleetScheduler {
    pub fn new(
        hosts: Vec<HostTarget>,
        collector: HostCollector,
        publisher: Arc<dyn Publisher>,
        flag: HealthFile,
        cadence: Duration,
    ) -> Self {
        Self {
            hosts,
            collector,
            publisher,
            health: HealthState::new(),
            flag,
            cadence,
        }
    }

    pub fn health(&self) -> HealthStatus {
        self.health.current()
    }

    /// Writes the initial `OK` flag, clearing whatever a previous run left behind.
    pub fn reset_flag(&self) {
        if let Err(e) = self.flag.write(HealthStatus::Ok) {
            warn!(path = %self.flag.path().display(), "could not write health flag: {e}");
        }
    }

    /// Runs forever.
    pub async fn run(&mut self) {
        self.reset_flag();
        loop {
            let started = Instant::now();
            let report = self.run_cycle().await;
            let elapsed = started.elapsed();
            debug!(
                hosts = report.hosts,
                failures = report.failures,
                elapsed_ms = elapsed.as_millis() as u64,
                "cycle done"
            );

            let pause = remaining_sleep(self.cadence, elapsed);
            if pause.is_zero() {
                info!(
                    elapsed_s = elapsed.as_secs_f64(),
                    cadence_s = self.cadence.as_secs(),
                    "cycle took longer than the cadence, starting next one now"
                );
            } else {
                sleep(pause).await;
            }
        }
    }

    /// One pass over every host. A failing host never stops the others.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut failures = 0;

        for target in &self.hosts {
            let stats = match self.collector.collect(target).await {
                CollectionOutcome::Success(stats) => stats,
                CollectionOutcome::Failure(e) => {
                    failures += 1;
                    error!(
                        host = %target.address,
                        port = target.port,
                        encryption = %target.encryption,
                        name = %target.display_name,
                        "could not collect stats from {target}: {e}"
                    );
                    continue;
                }
            };

            if let Err(e) = self.publisher.publish(target, &stats).await {
                failures += 1;
                error!(
                    host = %target.address,
                    port = target.port,
                    encryption = %target.encryption,
                    name = %target.display_name,
                    kind = e.kind(),
                    "could not upload data for {target}: {e}"
                );
            }
        }

        let transition = self.health.observe(failures > 0);
        if let Some(status) = transition {
            info!(status = status.as_str(), "health changed");
            if let Err(e) = self.flag.write(status) {
                warn!(path = %self.flag.path().display(), "could not write health flag: {e}");
            }
        }

        CycleReport {
            hosts: self.hosts.len(),
            failures,
            transition,
        }
    }
}

/// Time left in the cadence window; zero (never negative) on overrun.
pub fn remaining_sleep(cadence: Duration, elapsed: Duration) -> Duration {
    cadence.saturating_sub(elapsed)
}
