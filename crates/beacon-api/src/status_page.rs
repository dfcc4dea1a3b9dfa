//! Status page facade.
//!
//! Read-only view combining the monitor's latest run with per-service
//! uptime and incidents from the store. Never writes upstream state.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use beacon_core::{Status, aggregate};
use beacon_health::HealthMonitor;
use beacon_state::{Incident, IncidentFilter, StateResult, StateStore};

/// Uptime windows reported per service.
pub const UPTIME_24H: Duration = Duration::from_secs(24 * 60 * 60);
pub const UPTIME_7D: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const UPTIME_30D: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// `GET /api/v1/status` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusSummary {
    pub overall_status: Status,
    pub services: Vec<ServiceStatus>,
}

/// A service's displayed state: its latest sample, or `Unknown`
/// before the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Operational,
    Degraded,
    Down,
    Unknown,
}

impl From<Option<Status>> for ServiceState {
    fn from(status: Option<Status>) -> Self {
        match status {
            Some(Status::Operational) => Self::Operational,
            Some(Status::Degraded) => Self::Degraded,
            Some(Status::Down) => Self::Down,
            None => Self::Unknown,
        }
    }
}

/// One service row on the status page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceStatus {
    pub id: String,
    pub name: String,
    pub status: ServiceState,
    /// `null` when the window holds no samples.
    pub uptime_24h: Option<f64>,
    pub uptime_7d: Option<f64>,
    pub uptime_30d: Option<f64>,
}

#[derive(Clone)]
pub struct StatusPage {
    store: StateStore,
    monitor: Arc<HealthMonitor>,
}

impl StatusPage {
    pub fn new(store: StateStore, monitor: Arc<HealthMonitor>) -> Self {
        Self { store, monitor }
    }

    /// Current overall status plus every service's status and uptime.
    ///
    /// The overall status comes from the monitor's latest run. Before the
    /// first run it falls back to the services' most recent samples.
    pub async fn get_status(&self, now: u64) -> StateResult<StatusSummary> {
        let mut services = Vec::new();
        let mut current = Vec::new();
        for service in self.store.list_services()? {
            let status = self.store.current_status(&service.id)?;
            current.extend(status);
            services.push(ServiceStatus {
                status: status.into(),
                uptime_24h: self.store.uptime(&service.id, UPTIME_24H, now)?,
                uptime_7d: self.store.uptime(&service.id, UPTIME_7D, now)?,
                uptime_30d: self.store.uptime(&service.id, UPTIME_30D, now)?,
                id: service.id,
                name: service.name,
            });
        }

        let overall_status = match self.monitor.latest_report().await {
            Some(report) => report.overall_status(),
            None => aggregate(current),
        };
        Ok(StatusSummary {
            overall_status,
            services,
        })
    }

    pub fn list_incidents(&self, filter: &IncidentFilter) -> StateResult<Vec<Incident>> {
        self.store.list_incidents(filter)
    }

    pub fn get_incident(&self, id: &str) -> StateResult<Incident> {
        self.store.get_incident(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use beacon_core::CheckOutcome;
    use beacon_health::{CheckDefinition, RunOptions};
    use beacon_state::{NewIncident, Service, StateError};

    const NOW: u64 = 40 * 24 * 3_600_000;
    const HOUR: u64 = 3_600_000;

    fn page() -> (StatusPage, StateStore, Arc<HealthMonitor>) {
        let store = StateStore::open_in_memory().unwrap();
        let monitor = Arc::new(HealthMonitor::default());
        (StatusPage::new(store.clone(), monitor.clone()), store, monitor)
    }

    #[tokio::test]
    async fn empty_page_is_operational() {
        let (page, _, _) = page();
        let summary = page.get_status(NOW).await.unwrap();
        assert_eq!(summary.overall_status, Status::Operational);
        assert!(summary.services.is_empty());
    }

    #[tokio::test]
    async fn service_without_samples_is_unknown() {
        let (page, store, _) = page();
        store.put_service(&Service::new("api", "Public API")).unwrap();

        let summary = page.get_status(NOW).await.unwrap();
        let row = &summary.services[0];
        assert_eq!(row.status, ServiceState::Unknown);
        assert_eq!(row.uptime_24h, None);
        assert_eq!(row.uptime_30d, None);
        assert_eq!(summary.overall_status, Status::Operational);
    }

    #[tokio::test]
    async fn uptime_windows_differ() {
        let (page, store, _) = page();
        store.put_service(&Service::new("api", "Public API")).unwrap();
        // Down 10 days ago, healthy within the last day.
        store.record_sample("api", Status::Down, NOW - 10 * 24 * HOUR).unwrap();
        store.record_sample("api", Status::Operational, NOW - HOUR).unwrap();

        let summary = page.get_status(NOW).await.unwrap();
        let row = &summary.services[0];
        assert_eq!(row.status, ServiceState::Operational);
        assert_eq!(row.uptime_24h, Some(1.0));
        assert_eq!(row.uptime_7d, Some(1.0));
        assert_eq!(row.uptime_30d, Some(0.5));
    }

    #[test]
    fn service_state_serializes_lowercase() {
        assert_eq!(serde_json::to_value(ServiceState::Unknown).unwrap(), "unknown");
        assert_eq!(ServiceState::from(Some(Status::Degraded)), ServiceState::Degraded);
        assert_eq!(serde_json::to_value(ServiceState::from(Some(Status::Down))).unwrap(), "down");
    }

    #[tokio::test]
    async fn overall_falls_back_to_samples_before_first_run() {
        let (page, store, _) = page();
        store.put_service(&Service::new("api", "API")).unwrap();
        store.put_service(&Service::new("db", "DB")).unwrap();
        store.record_sample("api", Status::Degraded, NOW).unwrap();

        let summary = page.get_status(NOW).await.unwrap();
        assert_eq!(summary.overall_status, Status::Degraded);
    }

    #[tokio::test]
    async fn overall_uses_latest_run() {
        let (page, store, monitor) = page();
        store.put_service(&Service::new("api", "API")).unwrap();
        store.record_sample("api", Status::Operational, NOW).unwrap();

        monitor.register_check(CheckDefinition::new("api", || async {
            Ok(CheckOutcome::unhealthy("refused"))
        }));
        monitor.run_all(RunOptions::default()).await;

        let summary = page.get_status(NOW).await.unwrap();
        assert_eq!(summary.overall_status, Status::Down);
    }

    #[tokio::test]
    async fn incidents_pass_through() {
        let (page, store, _) = page();
        store.put_service(&Service::new("api", "API")).unwrap();
        let created = store
            .create_incident(&NewIncident::new("api", "Errors", "Looking"), NOW)
            .unwrap();

        assert_eq!(page.get_incident(&created.id).unwrap(), created);
        assert_eq!(page.list_incidents(&IncidentFilter::default()).unwrap().len(), 1);
        assert!(matches!(
            page.get_incident("inc-000404"),
            Err(StateError::IncidentNotFound(_))
        ));
    }
}
