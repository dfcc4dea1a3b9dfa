//! redb table definitions for the Beacon store.

use redb::TableDefinition;

/// Monitored services keyed by `{service_id}`.
pub const SERVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("services");

/// Status samples keyed by `{service_id}:{at:020}:{seq:020}`.
pub const SAMPLES: TableDefinition<&str, &[u8]> = TableDefinition::new("samples");

/// Incidents keyed by `{incident_id}`.
pub const INCIDENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("incidents");

/// Monotonic counters (sample sequence, incident ids).
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

pub const SAMPLE_SEQ: &str = "sample_seq";
pub const INCIDENT_SEQ: &str = "incident_seq";
