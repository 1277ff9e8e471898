//! Durable key-value engine
//!
//! The lifecycle manager needs point reads and writes of a handful of
//! range-local records. Single-key atomicity is sufficient; nothing here
//! relies on cross-key transactions.
//!
//! Implementations:
//! - [`MemEngine`]: ordered in-memory map
//! - [`FileEngine`]: one checksummed file per key, atomic replace on write
//! - [`FaultyEngine`]: wrapper failing selected operations

mod checksum;
mod errors;
mod faulty;
mod file;
mod memory;

pub use checksum::compute_checksum;
pub use errors::{printable_key, Severity, StorageError, StorageErrorCode, StorageResult};
pub use faulty::{FaultOp, FaultyEngine};
pub use file::FileEngine;
pub use memory::MemEngine;

/// Point-access key-value engine.
pub trait Engine: Send + Sync {
    /// Read a key. `Ok(None)` if absent.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Write a key. Durable once this returns.
    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Delete a key. Deleting an absent key succeeds.
    fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// All pairs whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;
}
