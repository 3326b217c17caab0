//! Shipment record synchronization core
//!
//! The components are plain transforms over in-memory record sets; only
//! [`pipeline`] talks to the feed, the store and the carriers.

pub mod enrich;
pub mod error;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod reconcile;
pub mod sequence;
pub mod types;

pub use error::{FeedError, LookupError, SchemaError, StoreError, SyncError};
pub use pipeline::{run_in_sequence, CycleReport, CycleTables, RunOutcome, SyncCycle};
