//! Operator persistence.
//!
//! - [`StoredRecord`]: `MsgPack` record body plus an out-of-band last-seen stamp
//! - [`MemoryOperatorStore`]: `DashMap`-backed [`OperatorStore`](avs_core::OperatorStore)

pub mod memory;
pub mod record;

pub use memory::MemoryOperatorStore;
pub use record::StoredRecord;
