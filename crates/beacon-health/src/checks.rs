//! Built-in checks.
//!
//! Each function returns a [`CheckDefinition`]. Dependencies are looked up
//! in [`Bonds`] on every run, so a bond registered after the check still
//! gets picked up, and a missing bond is a `down` result rather than a
//! construction error.

use std::sync::Arc;

use beacon_core::{CheckConfig, CheckOutcome, ConfigError};

use crate::bond::{Bonds, CacheBond, DatabaseBond};
use crate::probe::{HttpTarget, http_request};
use crate::registry::CheckDefinition;

/// Message for a check whose bond was never wired.
pub const NOT_CONFIGURED: &str = "bond not configured";

/// Database pool liveness.
///
/// `down` with "bond not configured" when nothing is registered under
/// `bond`, "pool unavailable" when the pool cannot be queried, or the
/// query error when the liveness query fails.
pub fn database_check(name: impl Into<String>, bonds: Arc<Bonds>, bond: impl Into<String>) -> CheckDefinition {
    let bond = bond.into();
    CheckDefinition::new(name, move || {
        let bonds = bonds.clone();
        let bond = bond.clone();
        async move {
            let Some(db) = bonds.get::<Arc<dyn DatabaseBond>>(&bond) else {
                return Ok(CheckOutcome::unhealthy(NOT_CONFIGURED));
            };
            let pool = match db.pool_status().await {
                Ok(pool) => pool,
                Err(e) => {
                    return Ok(CheckOutcome::unhealthy("pool unavailable")
                        .with_metadata("error", e.to_string()));
                }
            };
            let outcome = match db.ping().await {
                Ok(()) => CheckOutcome::healthy(),
                Err(e) => CheckOutcome::unhealthy(format!("liveness query failed: {e}")),
            };
            Ok(outcome
                .with_metadata("pool_size", pool.size)
                .with_metadata("pool_idle", pool.idle))
        }
    })
}

/// Cache provider liveness. Same not-configured / unavailable split as
/// [`database_check`].
pub fn cache_check(name: impl Into<String>, bonds: Arc<Bonds>, bond: impl Into<String>) -> CheckDefinition {
    let bond = bond.into();
    CheckDefinition::new(name, move || {
        let bonds = bonds.clone();
        let bond = bond.clone();
        async move {
            let Some(cache) = bonds.get::<Arc<dyn CacheBond>>(&bond) else {
                return Ok(CheckOutcome::unhealthy(NOT_CONFIGURED));
            };
            Ok(match cache.ping().await {
                Ok(()) => CheckOutcome::healthy(),
                Err(e) => CheckOutcome::unhealthy("cache unavailable")
                    .with_metadata("error", e.to_string()),
            })
        }
    })
}

/// HTTP endpoint reachability.
///
/// Non-2xx is `down` with "HTTP <code>"; transport errors are `down` with
/// the error. Slow 2xx responses become `degraded` through the check's
/// latency threshold.
pub fn http_check(name: impl Into<String>, target: HttpTarget) -> CheckDefinition {
    let target = Arc::new(target);
    CheckDefinition::new(name, move || {
        let target = target.clone();
        async move {
            let status = http_request(&target).await?;
            let code = status.as_u16();
            let outcome = if status.is_success() {
                CheckOutcome::healthy()
            } else {
                CheckOutcome::unhealthy(format!("HTTP {code}"))
            };
            Ok::<_, anyhow::Error>(outcome.with_metadata("status_code", code))
        }
    })
}

/// Presence of an arbitrary bond.
pub fn bond_check(name: impl Into<String>, bonds: Arc<Bonds>, bond: impl Into<String>) -> CheckDefinition {
    let bond = bond.into();
    CheckDefinition::new(name, move || {
        let bonds = bonds.clone();
        let bond = bond.clone();
        async move {
            Ok(if bonds.has(&bond) {
                CheckOutcome::healthy()
            } else {
                CheckOutcome::unhealthy(format!("Bond '{bond}' is not registered"))
            })
        }
    })
}

/// Build the check described by a config entry, applying its timeout and
/// latency threshold.
pub fn from_config(name: &str, config: &CheckConfig, bonds: &Arc<Bonds>) -> Result<CheckDefinition, ConfigError> {
    let mut def = match config {
        CheckConfig::Http { url, method, .. } => {
            let target = if method.eq_ignore_ascii_case("HEAD") {
                HttpTarget::head(url.clone())
            } else {
                HttpTarget::get(url.clone())
            };
            http_check(name, target)
        }
        CheckConfig::Database { bond, .. } => database_check(name, bonds.clone(), bond.clone()),
        CheckConfig::Cache { bond, .. } => cache_check(name, bonds.clone(), bond.clone()),
        CheckConfig::Bond { bond, .. } => bond_check(name, bonds.clone(), bond.clone()),
    };
    if let Some(timeout) = config.timeout()? {
        def = def.with_timeout(timeout);
    }
    if let Some(threshold) = config.latency_threshold()? {
        def = def.with_latency_threshold(threshold);
    }
    Ok(def)
}

/// The bond a config entry depends on, if nothing is registered under it
/// yet. HTTP checks have no bond.
pub fn missing_bond<'a>(config: &'a CheckConfig, bonds: &Bonds) -> Option<&'a str> {
    let bond = match config {
        CheckConfig::Http { .. } => return None,
        CheckConfig::Database { bond, .. } | CheckConfig::Cache { bond, .. } | CheckConfig::Bond { bond, .. } => bond,
    };
    (!bonds.has(bond)).then_some(bond.as_str())
}
