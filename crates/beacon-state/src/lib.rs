//! beacon-state — uptime and incident store for Beacon.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for monitored services, their status time series, and
//! operator-managed incidents.
//!
//! # Architecture
//!
//! Services and incidents are JSON-serialized into redb's `&[u8]` value
//! columns. Samples are append-only and keyed
//! `{service_id}:{at:020}:{seq:020}`, so a prefix range scan yields one
//! service's samples in timestamp order no matter the order they arrived.
//!
//! redb serializes write transactions, so concurrent `record_sample`
//! calls from several sources never lose an append.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{FieldError, StateError, StateResult};
pub use store::StateStore;
pub use types::*;
