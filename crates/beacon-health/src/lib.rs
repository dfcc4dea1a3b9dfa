//! beacon-health — health checks and the concurrent execution engine.
//!
//! Checks are registered by name in a [`CheckRegistry`]. Each run takes a
//! snapshot of the registry and dispatches every probe onto its own task,
//! racing it against its effective timeout. Results are collected in
//! registration order and rolled into an overall status.
//!
//! # Architecture
//!
//! ```text
//! HealthMonitor
//!   ├── CheckRegistry (name → CheckDefinition, insertion-ordered)
//!   ├── Engine::run(snapshot)
//!   │   ├── tokio::spawn(probe) per check
//!   │   ├── timeout race → CheckResult (engine-measured latency)
//!   │   └── join in registration order → RunReport
//!   ├── Latest RunReport (for overall_status)
//!   └── Optional recorder loop → StateStore samples
//! ```
//!
//! # Built-in checks
//!
//! [`checks`] provides database, cache, HTTP, and bond-presence checks.
//! The first two look up their dependency in a [`Bonds`] map and report
//! a missing dependency as `down` instead of failing to construct.

pub mod bond;
pub mod checks;
pub mod engine;
pub mod monitor;
pub mod probe;
pub mod registry;

pub use bond::{BondError, Bonds, CacheBond, DatabaseBond, PoolStatus};
pub use engine::{DEFAULT_TIMEOUT, Engine, RunOptions};
pub use monitor::HealthMonitor;
pub use registry::{CheckDefinition, CheckRegistry, Probe};
