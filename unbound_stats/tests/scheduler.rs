//! Poll-cycle behaviour with in-memory collaborators: failure isolation,
//! health-flag hysteresis and cadence arithmetic.
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use unbound_stats::collector::HostCollector;
use unbound_stats::control::StatsSource;
use unbound_stats::error::{ControlError, PublishError};
use unbound_stats::health::{HealthFile, HealthState, HealthStatus};
use unbound_stats::hosts::HostTarget;
use unbound_stats::publish::Publisher;
use unbound_stats::scheduler::{remaining_sleep, FleetScheduler};
use unbound_stats::types::{MetricSet, MetricValue};

const GOOD: &str = "total.num.queries=134\ntotal.num.cachehits=63\n";
const BAD: &str = "total.num.queries=134\nthis line has no separator\n";

/// Scripted replies per host name; each call pops the next one, the last one repeats.
#[derive(Default)]
struct ScriptedSource {
    script: Mutex<HashMap<String, VecDeque<Result<&'static str, ()>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn with(self, host: &str, replies: &[Result<&'static str, ()>]) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(host.to_string(), replies.iter().cloned().collect());
        self
    }
}

#[async_trait]
impl StatsSource for ScriptedSource {
    async fn send_command(
        &self,
        target: &HostTarget,
        command: &str,
    ) -> Result<String, ControlError> {
        assert_eq!(command, "stats");
        self.calls.lock().unwrap().push(target.display_name.clone());
        let mut script = self.script.lock().unwrap();
        let queue = script.get_mut(&target.display_name).expect("scripted host");
        let next = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            *queue.front().unwrap()
        };
        match next {
            Ok(reply) => Ok(reply.to_string()),
            Err(()) => Err(ControlError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "refused",
            ))),
        }
    }
}

#[derive(Default)]
struct RecordingPublisher {
    fail_for: Option<String>,
    published: Mutex<Vec<(String, MetricSet)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, target: &HostTarget, stats: &MetricSet) -> Result<(), PublishError> {
        if self.fail_for.as_deref() == Some(target.display_name.as_str()) {
            return Err(PublishError::Timeout);
        }
        self.published
            .lock()
            .unwrap()
            .push((target.display_name.clone(), stats.clone()));
        Ok(())
    }
}

fn host(name: &str) -> HostTarget {
    HostTarget::new("127.0.0.1", "8953", name, "N", Path::new(".")).unwrap()
}

fn scheduler(
    names: &[&str],
    source: Arc<ScriptedSource>,
    publisher: Arc<RecordingPublisher>,
    flag: &Path,
) -> FleetScheduler {
    FleetScheduler::new(
        names.iter().map(|n| host(n)).collect(),
        HostCollector::new(source, Duration::from_secs(1)),
        publisher,
        HealthFile::new(flag),
        Duration::from_secs(60),
    )
}

#[tokio::test]
async fn one_bad_host_does_not_affect_the_others() {
    let td = tempfile::tempdir().unwrap();
    let flag = td.path().join("healthcheck");
    let source = Arc::new(
        ScriptedSource::default()
            .with("dns1", &[Ok(BAD)])
            .with("dns2", &[Err(())])
            .with("dns3", &[Ok(GOOD)]),
    );
    let publisher = Arc::new(RecordingPublisher::default());
    let mut sched = scheduler(&["dns1", "dns2", "dns3"], source.clone(), publisher.clone(), &flag);

    let report = sched.run_cycle().await;
    assert_eq!(report.hosts, 3);
    assert_eq!(report.failures, 2);
    assert_eq!(report.transition, Some(HealthStatus::Failed));
    assert_eq!(*source.calls.lock().unwrap(), vec!["dns1", "dns2", "dns3"]);

    let published = publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "dns3");
    let pct = published[0].1["percent_cachehits"].as_f64();
    assert!((pct - 47.0149).abs() < 1e-3);

    assert_eq!(fs::read_to_string(&flag).unwrap(), "FAILED");
}

#[tokio::test]
async fn publish_failure_marks_cycle_but_keeps_publishing() {
    let td = tempfile::tempdir().unwrap();
    let flag = td.path().join("healthcheck");
    let source = Arc::new(
        ScriptedSource::default()
            .with("dns1", &[Ok(GOOD)])
            .with("dns2", &[Ok(GOOD)]),
    );
    let publisher = Arc::new(RecordingPublisher {
        fail_for: Some("dns1".into()),
        ..Default::default()
    });
    let mut sched = scheduler(&["dns1", "dns2"], source, publisher.clone(), &flag);

    let report = sched.run_cycle().await;
    assert!(report.failed());
    assert_eq!(report.failures, 1);
    let published = publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "dns2");
    assert_eq!(published[0].1["num_queries"], MetricValue::Int(134));
}

#[tokio::test]
async fn flag_only_changes_on_transitions() {
    let td = tempfile::tempdir().unwrap();
    let flag = td.path().join("healthcheck");
    let source = Arc::new(ScriptedSource::default().with("dns1", &[Err(()), Err(()), Ok(GOOD)]));
    let publisher = Arc::new(RecordingPublisher::default());
    let mut sched = scheduler(&["dns1"], source, publisher, &flag);

    sched.reset_flag();
    assert_eq!(fs::read_to_string(&flag).unwrap(), "OK");

    let first = sched.run_cycle().await;
    assert_eq!(first.transition, Some(HealthStatus::Failed));
    assert_eq!(fs::read_to_string(&flag).unwrap(), "FAILED");

    // no write on the second failing cycle: a marker we plant must survive
    fs::write(&flag, "untouched").unwrap();
    let second = sched.run_cycle().await;
    assert!(second.failed());
    assert_eq!(second.transition, None);
    assert_eq!(fs::read_to_string(&flag).unwrap(), "untouched");

    let third = sched.run_cycle().await;
    assert!(!third.failed());
    assert_eq!(third.transition, Some(HealthStatus::Ok));
    assert_eq!(fs::read_to_string(&flag).unwrap(), "OK");
    assert_eq!(sched.health(), HealthStatus::Ok);
}

#[tokio::test]
async fn healthy_fleet_never_writes_after_start() {
    let td = tempfile::tempdir().unwrap();
    let flag = td.path().join("healthcheck");
    let source = Arc::new(ScriptedSource::default().with("dns1", &[Ok(GOOD)]));
    let mut sched = scheduler(&["dns1"], source, Arc::new(RecordingPublisher::default()), &flag);

    for _ in 0..3 {
        let report = sched.run_cycle().await;
        assert_eq!(report.transition, None);
    }
    assert!(!flag.exists());
}

#[test]
fn health_state_hysteresis() {
    let mut state = HealthState::new();
    assert_eq!(state.current(), HealthStatus::Ok);
    let writes: Vec<_> = [true, true, false, false, true]
        .into_iter()
        .filter_map(|failed| state.observe(failed))
        .collect();
    assert_eq!(
        writes,
        vec![HealthStatus::Failed, HealthStatus::Ok, HealthStatus::Failed]
    );
}

#[test]
fn overrun_means_no_sleep() {
    let cadence = Duration::from_secs(60);
    assert_eq!(remaining_sleep(cadence, Duration::from_secs(15)), Duration::from_secs(45));
    assert_eq!(remaining_sleep(cadence, Duration::from_secs(60)), Duration::ZERO);
    assert_eq!(remaining_sleep(cadence, Duration::from_secs(95)), Duration::ZERO);
}
