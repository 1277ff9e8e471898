//! Per-range creation token
//!
//! Membership in the directory's `creating` set acts as a per-range lock
//! that is held across slow storage I/O without holding the directory lock.

use std::fmt;

use crate::descriptor::RangeId;

use super::ReplicaDirectory;

/// Exclusive right to create a replica for one range.
///
/// The range leaves the `creating` set when the token drops, on every path.
pub struct CreationToken<'a> {
    directory: &'a ReplicaDirectory,
    range_id: RangeId,
}

impl<'a> CreationToken<'a> {
    pub(super) fn new(directory: &'a ReplicaDirectory, range_id: RangeId) -> Self {
        Self {
            directory,
            range_id,
        }
    }

    pub fn range_id(&self) -> RangeId {
        self.range_id
    }
}

impl Drop for CreationToken<'_> {
    fn drop(&mut self) {
        self.directory.inner.lock().creating.remove(&self.range_id);
    }
}

impl fmt::Debug for CreationToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationToken")
            .field("range_id", &self.range_id)
            .finish()
    }
}
