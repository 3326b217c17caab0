//! Remote and persisted endpoints the sync cycle talks to
//!
//! - `zoho`: the analytics export feed
//! - `carriers`: FedEx and UPS tracking adapters
//! - `store`: table stores (CSV directory, XLSX workbook, Sheets)
//! - `resilience`: the lookup concurrency limiter

pub mod carriers;
pub mod resilience;
pub mod store;
pub mod zoho;

pub use carriers::{CarrierRegistry, TrackingClient};
pub use resilience::{ConcurrencyConfig, ConcurrencyLimiter};
pub use store::{open_store, TableStore};
pub use zoho::{FileFeed, SourceFeed, ZohoFeed};
