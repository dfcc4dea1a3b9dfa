//! Health monitor — the provider application code talks to.
//!
//! Owns the check registry and the engine, remembers the latest run, and
//! can drive a background loop that records each run into the uptime
//! store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use beacon_core::{RunReport, Status};
use beacon_state::StateStore;

use crate::engine::{Engine, RunOptions};
use crate::registry::{CheckDefinition, CheckRegistry};

/// Registry + engine + latest report.
///
/// Constructed explicitly at startup and shared via `Arc`.
pub struct HealthMonitor {
    registry: CheckRegistry,
    engine: Engine,
    latest: RwLock<Option<RunReport>>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(Engine::default())
    }
}

impl HealthMonitor {
    pub fn new(engine: Engine) -> Self {
        Self {
            registry: CheckRegistry::new(),
            engine,
            latest: RwLock::new(None),
        }
    }

    pub fn register_check(&self, def: CheckDefinition) {
        self.registry.register(def);
    }

    pub fn unregister_check(&self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Run every registered check once.
    ///
    /// Checks registered while the run is in flight are not part of it.
    pub async fn run_all(&self, options: RunOptions) -> RunReport {
        let snapshot = self.registry.list();
        let report = self.engine.run(snapshot, options).await;

        let mut latest = self.latest.write().await;
        // Overlapping runs: keep the one that started last.
        let newer = latest
            .as_ref()
            .is_none_or(|prev| prev.started_at <= report.started_at);
        if newer {
            *latest = Some(report.clone());
        }
        report
    }

    pub async fn latest_report(&self) -> Option<RunReport> {
        self.latest.read().await.clone()
    }

    /// Overall status of the latest run, running the checks first if
    /// nothing has run yet.
    pub async fn overall_status(&self) -> Status {
        if let Some(report) = self.latest.read().await.as_ref() {
            return report.overall_status();
        }
        self.run_all(RunOptions::default()).await.overall_status()
    }

    /// Spawn the recorder loop on the runtime.
    pub fn spawn_recorder(
        self: &Arc<Self>,
        store: StateStore,
        bindings: HashMap<String, String>,
        interval: Duration,
        options: RunOptions,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            monitor
                .run_recorder(store, bindings, interval, options, shutdown)
                .await;
        })
    }

    /// Run all checks every `interval` and record one sample per bound
    /// service. `bindings` maps check name → service id.
    pub async fn run_recorder(
        &self,
        store: StateStore,
        bindings: HashMap<String, String>,
        interval: Duration,
        options: RunOptions,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = interval.as_millis() as u64, bound = bindings.len(), "health recorder started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_all(options).await;
                    match store.record_report(&report, &bindings, report.completed_at) {
                        Ok(recorded) => {
                            debug!(recorded, overall = %report.overall_status(), "run recorded");
                        }
                        Err(e) => {
                            error!(error = %e, "failed to record health run");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("health recorder shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use beacon_core::CheckOutcome;
    use beacon_state::Service;

    fn flag_check(name: &str, healthy: Arc<AtomicBool>) -> CheckDefinition {
        CheckDefinition::new(name, move || {
            let healthy = healthy.clone();
            async move {
                Ok(if healthy.load(Ordering::SeqCst) {
                    CheckOutcome::healthy()
                } else {
                    CheckOutcome::unhealthy("flag down")
                })
            }
        })
    }

    #[tokio::test]
    async fn overall_status_runs_when_nothing_cached() {
        let monitor = HealthMonitor::default();
        assert!(monitor.latest_report().await.is_none());

        monitor.register_check(flag_check("db", Arc::new(AtomicBool::new(false))));
        assert_eq!(monitor.overall_status().await, Status::Down);
        assert!(monitor.latest_report().await.is_some());
    }

    #[tokio::test]
    async fn overall_status_uses_latest_run() {
        let healthy = Arc::new(AtomicBool::new(true));
        let monitor = HealthMonitor::default();
        monitor.register_check(flag_check("db", healthy.clone()));

        monitor.run_all(RunOptions::default()).await;
        healthy.store(false, Ordering::SeqCst);

        // Still the cached result until the next run.
        assert_eq!(monitor.overall_status().await, Status::Operational);
        monitor.run_all(RunOptions::default()).await;
        assert_eq!(monitor.overall_status().await, Status::Down);
    }

    #[tokio::test]
    async fn register_and_unregister() {
        let monitor = HealthMonitor::default();
        monitor.register_check(flag_check("db", Arc::new(AtomicBool::new(true))));
        monitor.register_check(flag_check("cache", Arc::new(AtomicBool::new(true))));

        let report = monitor.run_all(RunOptions::default()).await;
        assert_eq!(report.results.len(), 2);

        assert!(monitor.unregister_check("db"));
        let report = monitor.run_all(RunOptions::default()).await;
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].name, "cache");
    }

    #[tokio::test]
    async fn recorder_writes_samples_until_shutdown() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_service(&Service::new("primary-db", "Primary database"))
            .unwrap();

        let healthy = Arc::new(AtomicBool::new(true));
        let monitor = Arc::new(HealthMonitor::default());
        monitor.register_check(flag_check("db", healthy.clone()));
        monitor.register_check(flag_check("unbound", healthy.clone()));

        let bindings = HashMap::from([("db".to_string(), "primary-db".to_string())]);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = monitor.spawn_recorder(
            store.clone(),
            bindings,
            Duration::from_millis(20),
            RunOptions::default(),
            shutdown_rx,
        );

        tokio::time::sleep(Duration::from_millis(90)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let samples = store.samples("primary-db", 0, u64::MAX).unwrap();
        assert!(samples.len() >= 2, "recorded {}", samples.len());
        assert!(samples.iter().all(|s| s.status == Status::Operational));
        assert_eq!(store.current_status("primary-db").unwrap(), Some(Status::Operational));
    }
}
