//! Job record store for VGen.
//!
//! [`JobStore`] is the single source of truth for job state. Two backends:
//! - [`MemoryJobStore`]: in-process, for tests and single-node development
//! - [`RedisJobStore`]: JSON documents with compare-and-set updates

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryJobStore;
pub use redis_store::{RedisJobStore, RedisStoreConfig};
pub use store::{is_in_flight, is_unsubmitted, JobStore};
