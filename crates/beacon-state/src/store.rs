//! StateStore — redb-backed uptime and incident persistence.
//!
//! Services and incidents are JSON values keyed by id. Samples are
//! append-only and never rewritten. Every operation that names a service
//! or incident that does not exist fails with a typed not-found error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use beacon_core::{RunReport, Status};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(SERVICES).map_err(map_err!(Table))?;
        txn.open_table(SAMPLES).map_err(map_err!(Table))?;
        txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        txn.open_table(COUNTERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Services ───────────────────────────────────────────────────

    /// Insert or update a service.
    pub fn put_service(&self, service: &Service) -> StateResult<()> {
        let errors = service.validate();
        if !errors.is_empty() {
            return Err(StateError::Validation(errors));
        }
        let value = encode(service)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            table
                .insert(service.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = %service.id, "service stored");
        Ok(())
    }

    pub fn get_service(&self, id: &str) -> StateResult<Service> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => decode(guard.value()),
            None => Err(StateError::ServiceNotFound(id.to_string())),
        }
    }

    /// List all services ordered by id.
    pub fn list_services(&self) -> StateResult<Vec<Service>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Delete a service and its samples. Incidents are history and stay.
    /// Returns true if the service existed.
    pub fn delete_service(&self, id: &str) -> StateResult<bool> {
        let (lo, hi) = sample_range(id, 0, u64::MAX);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut services = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            existed = services.remove(id).map_err(map_err!(Write))?.is_some();

            let mut samples = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
            let keys: Vec<String> = samples
                .range(lo.as_str()..=hi.as_str())
                .map_err(map_err!(Read))?
                .map(|entry| entry.map(|(k, _)| k.value().to_string()))
                .collect::<Result<_, _>>()
                .map_err(map_err!(Read))?;
            for key in &keys {
                samples.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, existed, "service deleted");
        Ok(existed)
    }

    // ── Samples ────────────────────────────────────────────────────

    /// Append one sample to a service's time series.
    ///
    /// Timestamps are not required to be monotonic; queries return
    /// samples in timestamp order.
    pub fn record_sample(&self, service_id: &str, status: Status, at: u64) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        ensure_service(&txn, service_id)?;
        append_sample(&txn, service_id, Sample { at, status })?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%service_id, %status, at, "sample recorded");
        Ok(())
    }

    /// Record one sample per bound check result in a single transaction.
    ///
    /// `bindings` maps check name → service id. Results for unbound checks
    /// are skipped. Returns the number of samples written.
    pub fn record_report(
        &self,
        report: &RunReport,
        bindings: &HashMap<String, String>,
        at: u64,
    ) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut written = 0;
        for result in &report.results {
            let Some(service_id) = bindings.get(&result.name) else {
                continue;
            };
            ensure_service(&txn, service_id)?;
            append_sample(
                &txn,
                service_id,
                Sample {
                    at,
                    status: result.status,
                },
            )?;
            written += 1;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(written)
    }

    /// Samples for a service with `since <= at <= until`, oldest first.
    pub fn samples(&self, service_id: &str, since: u64, until: u64) -> StateResult<Vec<Sample>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let services = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        if services.get(service_id).map_err(map_err!(Read))?.is_none() {
            return Err(StateError::ServiceNotFound(service_id.to_string()));
        }

        let table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        if since > until {
            return Ok(results);
        }
        let (lo, hi) = sample_range(service_id, since, until);
        for entry in table.range(lo.as_str()..=hi.as_str()).map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Most recent sample's status, or `None` (unknown) with no samples.
    pub fn current_status(&self, service_id: &str) -> StateResult<Option<Status>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let services = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        if services.get(service_id).map_err(map_err!(Read))?.is_none() {
            return Err(StateError::ServiceNotFound(service_id.to_string()));
        }

        let table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
        let (lo, hi) = sample_range(service_id, 0, u64::MAX);
        let last = table
            .range(lo.as_str()..=hi.as_str())
            .map_err(map_err!(Read))?
            .next_back();
        match last {
            Some(entry) => {
                let (_, value) = entry.map_err(map_err!(Read))?;
                let sample: Sample = decode(value.value())?;
                Ok(Some(sample.status))
            }
            None => Ok(None),
        }
    }

    /// Fraction of up samples (operational or degraded) with
    /// `since <= at <= until`. `None` when there are no samples.
    pub fn uptime_between(&self, service_id: &str, since: u64, until: u64) -> StateResult<Option<f64>> {
        let samples = self.samples(service_id, since, until)?;
        if samples.is_empty() {
            return Ok(None);
        }
        let up = samples.iter().filter(|s| s.status.is_up()).count();
        Ok(Some(up as f64 / samples.len() as f64))
    }

    /// Uptime over the trailing `window` ending at `now` (ms).
    pub fn uptime(&self, service_id: &str, window: Duration, now: u64) -> StateResult<Option<f64>> {
        let since = now.saturating_sub(window.as_millis() as u64);
        self.uptime_between(service_id, since, now)
    }

    // ── Incidents ──────────────────────────────────────────────────

    /// Create an incident with its first history entry.
    pub fn create_incident(&self, new: &NewIncident, now: u64) -> StateResult<Incident> {
        let errors = new.validate();
        if !errors.is_empty() {
            return Err(StateError::Validation(errors));
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        ensure_service(&txn, &new.service_id)?;
        let seq = next_counter(&txn, INCIDENT_SEQ)?;
        let incident = Incident {
            id: format!("inc-{seq:06}"),
            service_id: new.service_id.clone(),
            title: new.title.trim().to_string(),
            status: new.status,
            created_at: now,
            updated_at: now,
            resolved_at: new.status.is_terminal().then_some(now),
            updates: vec![IncidentUpdate {
                at: now,
                status: new.status,
                message: new.message.trim().to_string(),
            }],
        };
        put_incident(&txn, &incident)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id = %incident.id, service_id = %incident.service_id, "incident created");
        Ok(incident)
    }

    /// Apply a patch, appending one history entry.
    ///
    /// Resolved incidents reject every update.
    pub fn update_incident(&self, id: &str, patch: &IncidentPatch, now: u64) -> StateResult<Incident> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut incident: Incident = {
            let table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
            let guard = table.get(id).map_err(map_err!(Read))?;
            match guard {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::IncidentNotFound(id.to_string())),
            }
        };
        if incident.status.is_terminal() {
            return Err(StateError::IncidentResolved(id.to_string()));
        }
        let errors = patch.validate();
        if !errors.is_empty() {
            return Err(StateError::Validation(errors));
        }

        if let Some(title) = &patch.title {
            incident.title = title.trim().to_string();
        }
        if let Some(status) = patch.status {
            incident.status = status;
            if status.is_terminal() {
                incident.resolved_at = Some(now);
            }
        }
        incident.updated_at = now;
        incident.updates.push(IncidentUpdate {
            at: now,
            status: incident.status,
            message: patch.message.trim().to_string(),
        });

        put_incident(&txn, &incident)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, status = ?incident.status, updates = incident.updates.len(), "incident updated");
        Ok(incident)
    }

    pub fn get_incident(&self, id: &str) -> StateResult<Incident> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => decode(guard.value()),
            None => Err(StateError::IncidentNotFound(id.to_string())),
        }
    }

    /// List incidents matching `filter`, newest first.
    pub fn list_incidents(&self, filter: &IncidentFilter) -> StateResult<Vec<Incident>> {
        if let Some(service_id) = &filter.service_id {
            self.get_service(service_id)?;
        }

        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let incident: Incident = decode(value.value())?;
            if filter.matches(&incident) {
                results.push(incident);
            }
        }
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }
}

// ── Transaction helpers ────────────────────────────────────────────

fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Inclusive key range covering a service's samples in `[since, until]`.
fn sample_range(service_id: &str, since: u64, until: u64) -> (String, String) {
    (
        format!("{service_id}:{since:020}:"),
        // '~' sorts after every digit, so this covers all sequence numbers.
        format!("{service_id}:{until:020}:~"),
    )
}

fn ensure_service(txn: &WriteTransaction, service_id: &str) -> StateResult<()> {
    let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
    if table.get(service_id).map_err(map_err!(Read))?.is_none() {
        return Err(StateError::ServiceNotFound(service_id.to_string()));
    }
    Ok(())
}

fn next_counter(txn: &WriteTransaction, name: &str) -> StateResult<u64> {
    let mut table = txn.open_table(COUNTERS).map_err(map_err!(Table))?;
    let current = table
        .get(name)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0);
    let next = current + 1;
    table.insert(name, next).map_err(map_err!(Write))?;
    Ok(next)
}

fn append_sample(txn: &WriteTransaction, service_id: &str, sample: Sample) -> StateResult<()> {
    let seq = next_counter(txn, SAMPLE_SEQ)?;
    let key = format!("{service_id}:{:020}:{seq:020}", sample.at);
    let value = encode(&sample)?;
    let mut table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
    table
        .insert(key.as_str(), value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

fn put_incident(txn: &WriteTransaction, incident: &Incident) -> StateResult<()> {
    let value = encode(incident)?;
    let mut table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
    table
        .insert(incident.id.as_str(), value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}
