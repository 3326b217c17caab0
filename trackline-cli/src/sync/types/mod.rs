//! Core types for shipment record synchronization

mod value;
mod record;
mod estimate;
mod table;

pub use value::*;
pub use record::*;
pub use estimate::*;
pub use table::*;
