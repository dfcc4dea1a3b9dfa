//! Execution engine — runs a snapshot of checks concurrently.
//!
//! Every probe runs on its own task and races its effective timeout.
//! A probe that errors, panics, or hangs only affects its own result;
//! the run completes once the slowest probe settles or times out.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, warn};

use beacon_core::{CheckOutcome, CheckResult, Metadata, RunReport, Status, epoch_millis};

use crate::registry::CheckDefinition;

/// Timeout applied when neither the check nor the run sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-run options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Cap applied to every check in this run.
    pub check_timeout: Option<Duration>,
}

impl RunOptions {
    pub fn with_check_timeout(timeout: Duration) -> Self {
        Self {
            check_timeout: Some(timeout),
        }
    }
}

/// Stateless runner: nothing is carried between runs.
#[derive(Debug, Clone, Copy)]
pub struct Engine {
    default_timeout: Duration,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Engine {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout: default_timeout.max(Duration::from_millis(1)),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// The smaller of the check's and the run's timeout, whichever exist,
    /// else the engine default.
    pub fn effective_timeout(&self, def: &CheckDefinition, options: &RunOptions) -> Duration {
        match (def.timeout(), options.check_timeout) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => self.default_timeout,
        }
        .max(Duration::from_millis(1))
    }

    /// Run every check and collect one result per check, in input order.
    pub async fn run(&self, checks: Vec<CheckDefinition>, options: RunOptions) -> RunReport {
        let started_at = epoch_millis();
        let clock = Instant::now();
        let count = checks.len();

        let pending = checks.into_iter().map(|def| {
            let timeout = self.effective_timeout(&def, &options);
            run_check(def, timeout)
        });
        let results = join_all(pending).await;

        let report = RunReport {
            started_at,
            completed_at: epoch_millis(),
            results,
        };
        debug!(
            checks = count,
            overall = %report.overall_status(),
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "health run complete"
        );
        report
    }
}

/// Dispatch one probe and normalize whatever happens into a `CheckResult`.
async fn run_check(def: CheckDefinition, timeout: Duration) -> CheckResult {
    let start = Instant::now();
    let mut handle = tokio::spawn(def.probe());

    let settled = tokio::time::timeout(timeout, &mut handle).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match settled {
        Err(_) => {
            // Best-effort cancellation; the report does not wait for it.
            handle.abort();
            let timeout_ms = timeout.as_millis() as u64;
            warn!(check = %def.name(), timeout_ms, "health check timed out");
            CheckResult {
                name: def.name().to_string(),
                status: Status::Down,
                latency_ms,
                message: Some(format!("Check timed out after {timeout_ms}ms")),
                timed_out: true,
                metadata: Metadata::new(),
            }
        }
        Ok(Err(join_err)) => {
            let message = if join_err.is_panic() {
                "Check panicked"
            } else {
                "Check was cancelled"
            };
            warn!(check = %def.name(), "{message}");
            failed(&def, latency_ms, message.to_string())
        }
        Ok(Ok(Err(e))) => {
            debug!(check = %def.name(), error = %e, "health check failed");
            failed(&def, latency_ms, e.to_string())
        }
        Ok(Ok(Ok(outcome))) => classify(&def, latency_ms, outcome),
    }
}

fn failed(def: &CheckDefinition, latency_ms: u64, message: String) -> CheckResult {
    CheckResult {
        name: def.name().to_string(),
        status: Status::Down,
        latency_ms,
        message: Some(message),
        timed_out: false,
        metadata: Metadata::new(),
    }
}

/// Apply the status rule to a settled probe.
fn classify(def: &CheckDefinition, latency_ms: u64, outcome: CheckOutcome) -> CheckResult {
    let threshold_ms = def.latency_threshold().map(|t| t.as_millis() as u64);

    let (status, message) = if !outcome.healthy {
        let message = outcome
            .message
            .unwrap_or_else(|| "Check reported unhealthy".to_string());
        (Status::Down, Some(message))
    } else if let Some(threshold_ms) = threshold_ms.filter(|t| latency_ms > *t) {
        let message = format!("Response time {latency_ms}ms exceeds threshold {threshold_ms}ms");
        (Status::Degraded, Some(message))
    } else {
        (Status::Operational, outcome.message)
    };

    CheckResult {
        name: def.name().to_string(),
        status,
        latency_ms,
        message,
        timed_out: false,
        metadata: outcome.metadata,
    }
}
