//! Check and run types shared by the engine, the store, and the API.
//!
//! Timestamps are unix epoch milliseconds (`u64`) throughout.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Structured metadata attached to an outcome by a probe.
pub type Metadata = BTreeMap<String, serde_json::Value>;

// ── Status ────────────────────────────────────────────────────────

/// Health of a single check, a service sample, or a whole run.
///
/// Variants are ordered by severity so `max` over a set of statuses
/// yields the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Operational,
    Degraded,
    Down,
}

impl Status {
    /// Whether the service answered (operational or degraded).
    pub fn is_up(self) -> bool {
        self != Status::Down
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Operational => "operational",
            Status::Degraded => "degraded",
            Status::Down => "down",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduce a set of statuses into one overall status.
///
/// Any `Down` wins, then any `Degraded`, otherwise `Operational`.
/// An empty set is vacuously `Operational`.
pub fn aggregate<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    statuses.into_iter().max().unwrap_or(Status::Operational)
}

// ── Probe outcome ────────────────────────────────────────────────

/// What a probe reports about itself. Never contains timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl CheckOutcome {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            ..Self::default()
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
            metadata: Metadata::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ── Check result ─────────────────────────────────────────────────

/// Normalized record for one check in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: Status,
    /// Wall-clock time from dispatch to settle or timeout, measured by the engine.
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

// ── Run report ───────────────────────────────────────────────────

/// One invocation of "run all checks".
///
/// The overall status is not stored; it is recomputed from `results`
/// whenever asked for (and when serialized).
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub started_at: u64,
    pub completed_at: u64,
    /// One entry per registered check, in registration order.
    pub results: Vec<CheckResult>,
}

impl RunReport {
    pub fn overall_status(&self) -> Status {
        aggregate(self.results.iter().map(|r| r.status))
    }

    /// Look up the result for a check by name.
    pub fn result(&self, name: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

impl Serialize for RunReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            started_at: u64,
            completed_at: u64,
            overall_status: Status,
            results: &'a [CheckResult],
        }

        Wire {
            started_at: self.started_at,
            completed_at: self.completed_at,
            overall_status: self.overall_status(),
            results: &self.results,
        }
        .serialize(serializer)
    }
}

/// Whether `id` is usable as a service id: non-empty, ASCII alphanumerics,
/// `-` and `_` only. Ids are embedded in store keys, so `:` is excluded.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Current unix time in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
