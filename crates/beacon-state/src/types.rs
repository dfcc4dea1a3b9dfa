//! Domain types for the Beacon store.
//!
//! These types represent monitored services, their status samples, and
//! incidents. All persisted types are serializable to/from JSON for
//! storage in redb tables.

use serde::{Deserialize, Serialize};

use beacon_core::{Status, is_valid_id};

use crate::error::FieldError;

/// Unique identifier for a monitored service.
pub type ServiceId = String;

/// Unique identifier for an incident (`inc-000001`).
pub type IncidentId = String;

const MAX_NAME_LEN: usize = 200;
const MAX_MESSAGE_LEN: usize = 5000;

// ── Service ───────────────────────────────────────────────────────

/// A monitored service shown on the status page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Service {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.id.is_empty() {
            errors.push(FieldError::new("id", "required"));
        } else if !is_valid_id(&self.id) {
            errors.push(FieldError::new("id", "invalid"));
        }
        check_text(&mut errors, "name", Some(&self.name), MAX_NAME_LEN);
        errors
    }
}

// ── Sample ────────────────────────────────────────────────────────

/// One point in a service's status time series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    /// Unix timestamp (milliseconds).
    pub at: u64,
    pub status: Status,
}

// ── Incident ──────────────────────────────────────────────────────

/// Lifecycle of an incident. `Resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Investigating,
    Identified,
    Monitoring,
    Resolved,
}

impl IncidentStatus {
    pub fn is_terminal(self) -> bool {
        self == IncidentStatus::Resolved
    }
}

/// One entry in an incident's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentUpdate {
    pub at: u64,
    pub status: IncidentStatus,
    pub message: String,
}

/// An operator-managed record of a service disruption.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    pub id: IncidentId,
    pub service_id: ServiceId,
    pub title: String,
    pub status: IncidentStatus,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<u64>,
    /// Append-only history, oldest first.
    pub updates: Vec<IncidentUpdate>,
}

impl Incident {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Payload for creating an incident.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewIncident {
    pub service_id: ServiceId,
    pub title: String,
    #[serde(default = "default_incident_status")]
    pub status: IncidentStatus,
    /// First history entry.
    pub message: String,
}

impl NewIncident {
    pub fn new(service_id: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            title: title.into(),
            status: IncidentStatus::Investigating,
            message: message.into(),
        }
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.service_id.is_empty() {
            errors.push(FieldError::new("service_id", "required"));
        } else if !is_valid_id(&self.service_id) {
            errors.push(FieldError::new("service_id", "invalid"));
        }
        check_text(&mut errors, "title", Some(&self.title), MAX_NAME_LEN);
        check_text(&mut errors, "message", Some(&self.message), MAX_MESSAGE_LEN);
        errors
    }
}

/// Payload for updating an incident. Every update appends one history
/// entry; `status` and `title` are changed only when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IncidentPatch {
    #[serde(default)]
    pub status: Option<IncidentStatus>,
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
}

impl IncidentPatch {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: IncidentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.title.is_some() {
            check_text(&mut errors, "title", self.title.as_deref(), MAX_NAME_LEN);
        }
        check_text(&mut errors, "message", Some(&self.message), MAX_MESSAGE_LEN);
        errors
    }
}

/// Criteria for listing incidents. Empty filter lists everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IncidentFilter {
    #[serde(default)]
    pub service_id: Option<ServiceId>,
    #[serde(default)]
    pub status: Option<IncidentStatus>,
    /// Only incidents that are not resolved.
    #[serde(default)]
    pub active_only: bool,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl IncidentFilter {
    pub fn matches(&self, incident: &Incident) -> bool {
        self.service_id
            .as_ref()
            .is_none_or(|id| *id == incident.service_id)
            && self.status.is_none_or(|s| s == incident.status)
            && (!self.active_only || incident.is_active())
    }
}

fn default_incident_status() -> IncidentStatus {
    IncidentStatus::Investigating
}

fn check_text(errors: &mut Vec<FieldError>, field: &str, value: Option<&str>, max: usize) {
    match value.map(str::trim) {
        None | Some("") => errors.push(FieldError::new(field, "required")),
        Some(v) if v.chars().count() > max => errors.push(FieldError::new(field, "too_long")),
        Some(_) => {}
    }
}
