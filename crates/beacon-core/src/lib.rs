//! beacon-core — shared types and configuration for Beacon.
//!
//! Defines the three-valued [`Status`], the raw [`CheckOutcome`] a probe
//! returns, the normalized [`CheckResult`] the engine produces, and the
//! [`RunReport`] for one invocation of "run all checks". The overall status
//! of a report is always derived from its results via [`aggregate`].

pub mod config;
pub mod types;

pub use config::{BeaconConfig, CheckConfig, ConfigError, parse_duration};
pub use types::*;
