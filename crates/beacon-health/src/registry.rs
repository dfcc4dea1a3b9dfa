//! Check registry — named probe definitions in registration order.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use beacon_core::CheckOutcome;

/// An async health probe. An `Err` is reported as `down` with its message.
pub type Probe = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<CheckOutcome>> + Send + Sync>;

/// A named probe plus its timeout and latency threshold.
#[derive(Clone)]
pub struct CheckDefinition {
    name: String,
    probe: Probe,
    timeout: Option<Duration>,
    latency_threshold: Option<Duration>,
}

impl CheckDefinition {
    pub fn new<F, Fut>(name: impl Into<String>, probe: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<CheckOutcome>> + Send + 'static,
    {
        Self {
            name: name.into(),
            probe: Arc::new(move || Box::pin(probe())),
            timeout: None,
            latency_threshold: None,
        }
    }

    /// Override the engine default timeout. Zero is raised to 1ms.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.max(Duration::from_millis(1)));
        self
    }

    /// Healthy results slower than this are reported as degraded.
    pub fn with_latency_threshold(mut self, threshold: Duration) -> Self {
        self.latency_threshold = Some(threshold);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn latency_threshold(&self) -> Option<Duration> {
        self.latency_threshold
    }

    /// Start one invocation of the probe.
    pub fn probe(&self) -> BoxFuture<'static, anyhow::Result<CheckOutcome>> {
        (self.probe)()
    }
}

impl std::fmt::Debug for CheckDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckDefinition")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("latency_threshold", &self.latency_threshold)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered map of check name → definition.
///
/// Runs never iterate the live structure: [`CheckRegistry::list`] hands
/// out a snapshot, so a registration during a run lands in the next one.
#[derive(Default)]
pub struct CheckRegistry {
    checks: RwLock<Vec<CheckDefinition>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check. A check with the same name is replaced in place,
    /// keeping its original position.
    pub fn register(&self, def: CheckDefinition) {
        let mut checks = self.checks.write().unwrap_or_else(PoisonError::into_inner);
        match checks.iter_mut().find(|c| c.name == def.name) {
            Some(slot) => {
                debug!(name = %def.name, "check replaced");
                *slot = def;
            }
            None => {
                debug!(name = %def.name, "check registered");
                checks.push(def);
            }
        }
    }

    /// Remove a check by name. No-op if absent; returns whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut checks = self.checks.write().unwrap_or_else(PoisonError::into_inner);
        let before = checks.len();
        checks.retain(|c| c.name != name);
        let removed = checks.len() != before;
        if removed {
            debug!(%name, "check unregistered");
        }
        removed
    }

    /// Snapshot of the registered checks in registration order.
    pub fn list(&self) -> Vec<CheckDefinition> {
        self.checks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.checks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.checks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_check(name: &str) -> CheckDefinition {
        CheckDefinition::new(name, || async { Ok(CheckOutcome::healthy()) })
    }

    #[test]
    fn register_preserves_order() {
        let registry = CheckRegistry::new();
        registry.register(ok_check("db"));
        registry.register(ok_check("cache"));
        registry.register(ok_check("http"));
        assert_eq!(registry.names(), vec!["db", "cache", "http"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn register_same_name_overwrites_in_place() {
        let registry = CheckRegistry::new();
        registry.register(ok_check("db"));
        registry.register(ok_check("cache"));
        registry.register(ok_check("db").with_timeout(Duration::from_secs(9)));

        let checks = registry.list();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].name(), "db");
        assert_eq!(checks[0].timeout(), Some(Duration::from_secs(9)));
    }

    #[test]
    fn unregister_absent_is_noop() {
        let registry = CheckRegistry::new();
        registry.register(ok_check("db"));
        assert!(!registry.unregister("missing"));
        assert!(registry.unregister("db"));
        assert!(registry.is_empty());
    }

    #[test]
    fn list_is_a_snapshot() {
        let registry = CheckRegistry::new();
        registry.register(ok_check("db"));
        let snapshot = registry.list();
        registry.register(ok_check("late"));
        assert_eq!(snapshot.len(), 1);
        assert!(registry.contains("late"));

        // Restartable: the same snapshot can be walked twice.
        let first: Vec<&str> = snapshot.iter().map(|c| c.name()).collect();
        let second: Vec<&str> = snapshot.iter().map(|c| c.name()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let def = ok_check("db").with_timeout(Duration::ZERO);
        assert_eq!(def.timeout(), Some(Duration::from_millis(1)));
    }

    #[tokio::test]
    async fn probe_can_be_invoked_repeatedly() {
        let def = CheckDefinition::new("flag", || async {
            Ok(CheckOutcome::healthy().with_message("fine"))
        });
        for _ in 0..2 {
            let outcome = def.probe().await.unwrap();
            assert_eq!(outcome.message.as_deref(), Some("fine"));
        }
    }
}
