//! Fault injection wrapper
//!
//! Fails selected operations on keys matching a prefix, leaving the inner
//! engine untouched. Used to drive creation and teardown down their unwind
//! paths.

use std::io;

use parking_lot::Mutex;

use super::errors::{StorageError, StorageResult};
use super::Engine;

/// Engine operation a fault can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Get,
    Put,
    Delete,
}

#[derive(Debug, Clone)]
struct FaultRule {
    op: FaultOp,
    key_prefix: Vec<u8>,
    /// Remaining failures; `None` fails forever
    remaining: Option<u32>,
}

/// Engine wrapper that injects I/O failures.
pub struct FaultyEngine<E> {
    inner: E,
    rules: Mutex<Vec<FaultRule>>,
}

impl<E: Engine> FaultyEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            rules: Mutex::new(Vec::new()),
        }
    }

    /// Fail every `op` on keys starting with `key_prefix`.
    pub fn fail_always(&self, op: FaultOp, key_prefix: &[u8]) {
        self.rules.lock().push(FaultRule {
            op,
            key_prefix: key_prefix.to_vec(),
            remaining: None,
        });
    }

    /// Fail the next `times` matching operations, then pass through.
    pub fn fail_times(&self, op: FaultOp, key_prefix: &[u8], times: u32) {
        self.rules.lock().push(FaultRule {
            op,
            key_prefix: key_prefix.to_vec(),
            remaining: Some(times),
        });
    }

    /// Remove every rule.
    pub fn heal(&self) {
        self.rules.lock().clear();
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn check(&self, op: FaultOp, key: &[u8]) -> StorageResult<()> {
        let mut rules = self.rules.lock();
        let hit = rules.iter_mut().position(|r| {
            r.op == op && key.starts_with(&r.key_prefix) && r.remaining != Some(0)
        });
        let Some(idx) = hit else {
            return Ok(());
        };
        if let Some(n) = rules[idx].remaining.as_mut() {
            *n -= 1;
        }
        let source = io::Error::other(format!("injected {:?} fault", op));
        let err = match op {
            FaultOp::Get => StorageError::read_failed("injected fault", source),
            FaultOp::Put | FaultOp::Delete => StorageError::write_failed("injected fault", source),
        };
        Err(err.with_key(key))
    }
}

impl<E: Engine> Engine for FaultyEngine<E> {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.check(FaultOp::Get, key)?;
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.check(FaultOp::Put, key)?;
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.check(FaultOp::Delete, key)?;
        self.inner.delete(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.check(FaultOp::Get, prefix)?;
        self.inner.scan_prefix(prefix)
    }
}
