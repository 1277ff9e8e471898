//! rangedb - per-node replica lifecycle management for a range-partitioned store
//!
//! A node hosts at most one replica per range. This crate decides when a
//! replica handle may be created, handed out, initialized or destroyed,
//! and keeps the node's directory of replicas consistent with the
//! deletion markers (tombstones) persisted in the engine.
//!
//! Entry point: [`lifecycle::LifecycleCoordinator`].

pub mod cli;
pub mod descriptor;
pub mod directory;
pub mod engine;
pub mod lifecycle;
pub mod observability;
pub mod replica;
pub mod state;
