//! Cluster metadata consumed by the lifecycle manager
//!
//! Identifiers, key spans and range descriptors.

mod ids;
mod range;
mod span;

pub use ids::{NodeId, RangeId, ReplicaId, StoreId};
pub use range::{RangeDescriptor, ReplicaDescriptor};
pub use span::KeySpan;
