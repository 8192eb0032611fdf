//! In-memory store, used by tests and ephemeral nodes

use crate::common::{Error, Result};
use crate::storage::store::{key_in_ns, ns_prefix, BatchOp, DataIterator, DataStore};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

pub struct MemStore {
    map: RwLock<Map>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Map> {
        self.map.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Map> {
        self.map.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore for MemStore {
    fn get(&self, ns: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read().get(&key_in_ns(ns, key)?).cloned())
    }

    fn put(&self, ns: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.write().insert(key_in_ns(ns, key)?, value.to_vec());
        Ok(())
    }

    fn remove(&self, ns: &str, key: &[u8]) -> Result<()> {
        match self.write().remove(&key_in_ns(ns, key)?) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(String::from_utf8_lossy(key).into_owned())),
        }
    }

    fn write_batch(&self, ns: &str, ops: Vec<BatchOp>) -> Result<()> {
        let prefix = ns_prefix(ns)?;
        let full = |key: &[u8]| {
            let mut k = prefix.clone();
            k.extend_from_slice(key);
            k
        };
        let mut map = self.write();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(full(&key), value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&full(&key));
                }
            }
        }
        Ok(())
    }

    fn iter<'a>(&'a self, ns: &str) -> Result<Box<dyn DataIterator + 'a>> {
        Ok(Box::new(MemIterator {
            store: self,
            prefix: ns_prefix(ns)?,
            current: None,
        }))
    }
}

/// Cursor that re-seeks from its last key on every step, so it never holds
/// the lock between calls.
struct MemIterator<'a> {
    store: &'a MemStore,
    prefix: Vec<u8>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl MemIterator<'_> {
    fn load(&mut self, from: Bound<Vec<u8>>) {
        let store = self.store;
        let map = store.read();
        self.current = map
            .range((from, Bound::Unbounded))
            .next()
            .filter(|(k, _)| k.starts_with(&self.prefix))
            .map(|(k, v)| (k.clone(), v.clone()));
    }
}

impl DataIterator for MemIterator<'_> {
    fn seek(&mut self, key: &[u8]) {
        let mut start = self.prefix.clone();
        start.extend_from_slice(key);
        self.load(Bound::Included(start));
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current
            .as_ref()
            .map(|(k, _)| &k[self.prefix.len()..])
            .unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.current
            .as_ref()
            .map(|(_, v)| v.as_slice())
            .unwrap_or_default()
    }

    fn next(&mut self) {
        if let Some((key, _)) = self.current.take() {
            self.load(Bound::Excluded(key));
        }
    }

    fn status(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(store: &MemStore, ns: &str, from: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut it = store.iter(ns).unwrap();
        it.seek(from);
        let mut out = Vec::new();
        while it.valid() {
            out.push((it.key().to_vec(), it.value().to_vec()));
            it.next();
        }
        out
    }

    #[test]
    fn test_get_put_remove() {
        let store = MemStore::new();
        assert_eq!(store.get("ns", b"k").unwrap(), None);

        store.put("ns", b"k", b"v").unwrap();
        assert_eq!(store.get("ns", b"k").unwrap(), Some(b"v".to_vec()));

        store.remove("ns", b"k").unwrap();
        assert!(store.get("ns", b"k").unwrap().is_none());
        assert!(matches!(store.remove("ns", b"k"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let store = MemStore::new();
        store.put("a", b"k1", b"1").unwrap();
        store.put("b", b"k2", b"2").unwrap();
        store.put("ab", b"k3", b"3").unwrap();

        assert!(store.get("b", b"k1").unwrap().is_none());
        assert_eq!(collect(&store, "a", b""), vec![(b"k1".to_vec(), b"1".to_vec())]);
        assert_eq!(collect(&store, "b", b""), vec![(b"k2".to_vec(), b"2".to_vec())]);
    }

    #[test]
    fn test_iter_seek_and_order() {
        let store = MemStore::new();
        for key in ["c", "a", "d", "b"] {
            store.put("ns", key.as_bytes(), key.as_bytes()).unwrap();
        }
        let keys: Vec<_> = collect(&store, "ns", b"b")
            .into_iter()
            .map(|(k, _)| String::from_utf8(k).unwrap())
            .collect();
        assert_eq!(keys, vec!["b", "c", "d"]);

        let mut it = store.iter("empty").unwrap();
        it.seek(b"");
        assert!(!it.valid());
        assert!(it.key().is_empty());
    }

    #[test]
    fn test_write_batch() {
        let store = MemStore::new();
        store.put("ns", b"old", b"x").unwrap();
        store
            .write_batch(
                "ns",
                vec![
                    BatchOp::Put {
                        key: b"new".to_vec(),
                        value: b"y".to_vec(),
                    },
                    BatchOp::Delete { key: b"old".to_vec() },
                ],
            )
            .unwrap();
        assert!(store.get("ns", b"old").unwrap().is_none());
        assert_eq!(store.get("ns", b"new").unwrap(), Some(b"y".to_vec()));
        assert_eq!(store.len(), 1);
    }
}
