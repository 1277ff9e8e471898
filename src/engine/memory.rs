//! In-memory engine

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::errors::StorageResult;
use super::Engine;

/// Ordered in-memory engine. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemEngine {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Engine for MemEngine {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let data = self.data.read();
        Ok(data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let e = MemEngine::new();
        assert_eq!(e.get(b"k").unwrap(), None);

        e.put(b"k", b"v1").unwrap();
        e.put(b"k", b"v2").unwrap();
        assert_eq!(e.get(b"k").unwrap(), Some(b"v2".to_vec()));

        e.delete(b"k").unwrap();
        e.delete(b"k").unwrap();
        assert!(e.is_empty());
    }

    #[test]
    fn test_scan_prefix_is_ordered_and_bounded() {
        let e = MemEngine::new();
        e.put(b"a/2", b"2").unwrap();
        e.put(b"a/1", b"1").unwrap();
        e.put(b"b/1", b"x").unwrap();
        e.put(b"a", b"root").unwrap();

        let got: Vec<_> = e
            .scan_prefix(b"a/")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(got, vec![b"a/1".to_vec(), b"a/2".to_vec()]);
    }
}
