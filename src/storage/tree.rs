//! Tree structure: directory semantics over a flat ordered store
//!
//! - `put` creates missing ancestors as valueless intermediate nodes and
//!   refreshes `last_modified` of the existing ones
//! - `remove` refuses to delete a node that still has children; ancestors
//!   are never pruned
//! - `list` returns the direct children of a directory in key order

use crate::common::utils::timestamp_now_millis;
use crate::common::{Error, Result};
use crate::storage::codec;
use crate::storage::store::{BatchOp, DataStore};
use crate::storage::structure::{NodeIter, Structure};
use crate::storage::value::{NodeRecord, ValueInfo};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct TreeStructure {
    store: Arc<dyn DataStore>,
    /// Serializes mutations so concurrent writers never interleave on a
    /// shared ancestor chain
    write_lock: Mutex<()>,
}

impl TreeStructure {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Structure for TreeStructure {
    fn get(&self, ns: &str, key: &str) -> Result<ValueInfo> {
        match self.store.get(ns, codec::encode(key).as_bytes())? {
            Some(raw) => Ok(NodeRecord::decode(&raw)?.into_info()),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    /// Write the node and every ancestor in one batch. An ancestor that
    /// cannot be read aborts the call before anything is written.
    fn put(&self, ns: &str, key: &str, info: &ValueInfo) -> Result<()> {
        let _guard = self.lock_writes();
        let now = timestamp_now_millis();
        let node = NodeRecord::from_info(info, now);

        let mut ops = vec![BatchOp::Put {
            key: codec::encode(key).into_bytes(),
            value: node.encode()?,
        }];
        let mut created = 0;
        let mut parent = codec::parent(key);
        while !parent.is_empty() {
            let structured = codec::encode(parent);
            let record = match self.store.get(ns, structured.as_bytes())? {
                Some(raw) => {
                    let mut existing = NodeRecord::decode(&raw)?;
                    existing.last_modified = now;
                    existing
                }
                None => {
                    created += 1;
                    NodeRecord::intermediate_of(&node)
                }
            };
            ops.push(BatchOp::Put {
                key: structured.into_bytes(),
                value: record.encode()?,
            });
            parent = codec::parent(parent);
        }

        self.store.write_batch(ns, ops)?;
        tracing::debug!(ns, key, created, "tree put");
        Ok(())
    }

    fn remove(&self, ns: &str, key: &str) -> Result<()> {
        let _guard = self.lock_writes();
        match self.list(ns, key)?.next() {
            None => {}
            Some(Ok(_)) | Some(Err(Error::Invalid(_))) => {
                return Err(Error::Invalid(format!("directory not empty: {}", key)));
            }
            Some(Err(e)) => return Err(e),
        }
        self.store
            .remove(ns, codec::encode(key).as_bytes())
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(key.to_string()),
                other => other,
            })?;
        tracing::debug!(ns, key, "tree remove");
        Ok(())
    }

    /// Direct children of `key`. Empty when the directory is a leaf, does not
    /// exist, or the namespace is empty.
    fn list<'a>(&'a self, ns: &str, key: &str) -> Result<NodeIter<'a>> {
        let it = self.store.iter(ns)?;
        Ok(NodeIter::new(
            it,
            codec::list_prefix(key).into_bytes(),
            codec::decode,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Status;
    use crate::storage::memory::MemStore;
    use crate::storage::store::DataIterator;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn tree() -> TreeStructure {
        TreeStructure::new(Arc::new(MemStore::new()))
    }

    fn keys(tree: &TreeStructure, ns: &str, dir: &str) -> Vec<String> {
        tree.list(ns, dir)
            .unwrap()
            .map(|entry| entry.unwrap().key)
            .collect()
    }

    //   / - /testa - /testaa - /testaaa
    //     |        |         +- /testaab
    //     |        +- /testab - /testaba
    //     +- /testb - /testba - /testbaa
    //     |                   +- /testbab
    //     +- /testc - /testca - /testcaa
    fn build_sample(tree: &TreeStructure) {
        for path in [
            "/",
            "/testa/testaa/testaaa",
            "/testa/testaa/testaab",
            "/testa/testab/testaba",
            "/testb/testba/testbaa",
            "/testb/testba/testbab",
            "/testc/testca/testcaa",
        ] {
            let info = ValueInfo {
                owner: Some("myself".into()),
                ..ValueInfo::permanent(path)
            };
            tree.put("test", path, &info).unwrap();
        }
    }

    #[test]
    fn test_get_put() {
        let tree = tree();
        build_sample(&tree);

        let info = tree.get("test", "/testa/testaa/testaab").unwrap();
        assert!(!info.temp);
        assert!(!info.intermediate);
        assert_eq!(info.owner, None);
        assert_eq!(info.value, b"/testa/testaa/testaab");
        assert!(info.last_modified > 0);
    }

    #[test]
    fn test_ancestors_auto_created() {
        let tree = tree();
        build_sample(&tree);

        for dir in ["/testa/testaa", "/testa"] {
            let info = tree.get("test", dir).unwrap();
            assert!(info.intermediate);
            assert!(info.value.is_empty());
            assert!(!info.temp);
            assert_eq!(info.owner, None);
        }
    }

    #[test]
    fn test_get_missing() {
        let tree = tree();
        build_sample(&tree);

        let err = tree.get("test", "/testc/testaa").unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
        let deep = "/testa/testaa/testaaa/testaaaa/testaaaa/testaaaa";
        assert!(tree.get("test", deep).unwrap_err().is_not_found());
        assert!(tree.get("other", "/testa").unwrap_err().is_not_found());
    }

    #[test]
    fn test_levels_are_independent() {
        let tree = tree();
        build_sample(&tree);

        tree.put("test", "/testa/testaa/testaa", &ValueInfo::permanent("deep"))
            .unwrap();
        assert_eq!(tree.get("test", "/testa/testaa/testaa").unwrap().value, b"deep");
        assert!(tree.get("test", "/testa/testaa").unwrap().value.is_empty());
    }

    #[test]
    fn test_put_keeps_existing_ancestor_value() {
        let tree = tree();
        tree.put("ns", "/app", &ValueInfo::permanent("config")).unwrap();
        let before = tree.get("ns", "/app").unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        tree.put("ns", "/app/node", &ValueInfo::permanent("x")).unwrap();

        let after = tree.get("ns", "/app").unwrap();
        assert_eq!(after.value, b"config");
        assert!(!after.intermediate);
        assert!(after.last_modified > before.last_modified);
    }

    #[test]
    fn test_temp_flags_copied_to_new_ancestors() {
        let tree = tree();
        tree.put("ns", "/locks/a/holder", &ValueInfo::temp("me", "sess-1"))
            .unwrap();
        let parent = tree.get("ns", "/locks/a").unwrap();
        assert!(parent.temp);
        assert!(parent.intermediate);
        assert_eq!(parent.owner.as_deref(), Some("sess-1"));
    }

    #[test]
    fn test_list_root() {
        let tree = tree();
        build_sample(&tree);

        let entries: Vec<_> = tree
            .list("test", "/")
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        let names: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(names, vec!["/testa", "/testb", "/testc"]);
        for entry in entries {
            assert!(!entry.info.temp);
            assert_eq!(entry.info.owner, None);
            assert!(entry.info.value.is_empty());
        }
    }

    #[test]
    fn test_list_children() {
        let tree = tree();
        build_sample(&tree);

        assert_eq!(keys(&tree, "test", "/testa"), vec!["/testa/testaa", "/testa/testab"]);
        assert_eq!(
            keys(&tree, "test", "/testa/testaa/"),
            vec!["/testa/testaa/testaaa", "/testa/testaa/testaab"]
        );
        assert!(keys(&tree, "test", "/testa/testaa/testaaa").is_empty());
        assert!(keys(&tree, "test", "/testf").is_empty());
        assert!(keys(&tree, "nothing", "/").is_empty());
    }

    #[test]
    fn test_remove() {
        let tree = tree();
        build_sample(&tree);

        tree.remove("test", "/testa/testaa/testaaa").unwrap();
        assert!(tree.get("test", "/testa/testaa/testaaa").unwrap_err().is_not_found());
        assert!(tree.get("test", "/testa/testaa").is_ok());

        let err = tree.remove("test", "/testc").unwrap_err();
        assert_eq!(err.status(), Status::Invalid);
        assert!(tree.get("test", "/testc").is_ok());

        let err = tree.remove("test", "/testf").unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
    }

    #[test]
    fn test_remove_leaf_then_parent() {
        let tree = tree();
        tree.put("ns", "/x/y/z", &ValueInfo::permanent("v")).unwrap();

        assert_eq!(tree.remove("ns", "/x").unwrap_err().status(), Status::Invalid);
        tree.remove("ns", "/x/y/z").unwrap();
        assert!(tree.get("ns", "/x/y").unwrap().intermediate);
        tree.remove("ns", "/x/y").unwrap();
        tree.remove("ns", "/x").unwrap();
        assert!(keys(&tree, "ns", "/").is_empty());
    }

    #[test]
    fn test_list_reports_corrupted_entry() {
        let store = Arc::new(MemStore::new());
        let tree = TreeStructure::new(store.clone());
        tree.put("ns", "/a", &ValueInfo::permanent("1")).unwrap();
        store.put("ns", codec::encode("/b").as_bytes(), b"\xff\xff").unwrap();
        tree.put("ns", "/c", &ValueInfo::permanent("3")).unwrap();

        let items: Vec<_> = tree.list("ns", "/").unwrap().collect();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert_eq!(items[1].as_ref().unwrap_err().status(), Status::Invalid);
        assert_eq!(items[2].as_ref().unwrap().key, "/c");

        assert_eq!(tree.get("ns", "/b").unwrap_err().status(), Status::Invalid);
    }

    /// Store that can be told to fail reads of one key or every batch
    struct FlakyStore {
        inner: MemStore,
        fail_get: Option<Vec<u8>>,
        fail_batch: AtomicBool,
    }

    impl DataStore for FlakyStore {
        fn get(&self, ns: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
            if self.fail_get.as_deref() == Some(key) {
                return Err(Error::Database("read failure".into()));
            }
            self.inner.get(ns, key)
        }
        fn put(&self, ns: &str, key: &[u8], value: &[u8]) -> Result<()> {
            self.inner.put(ns, key, value)
        }
        fn remove(&self, ns: &str, key: &[u8]) -> Result<()> {
            self.inner.remove(ns, key)
        }
        fn write_batch(&self, ns: &str, ops: Vec<BatchOp>) -> Result<()> {
            if self.fail_batch.load(Ordering::SeqCst) {
                return Err(Error::Database("write failure".into()));
            }
            self.inner.write_batch(ns, ops)
        }
        fn iter<'a>(&'a self, ns: &str) -> Result<Box<dyn DataIterator + 'a>> {
            self.inner.iter(ns)
        }
    }

    #[test]
    fn test_failed_put_leaves_no_partial_chain() {
        let store = Arc::new(FlakyStore {
            inner: MemStore::new(),
            fail_get: Some(codec::encode("/x").into_bytes()),
            fail_batch: AtomicBool::new(false),
        });
        let tree = TreeStructure::new(store.clone());

        let err = tree.put("ns", "/x/y/z", &ValueInfo::permanent("v")).unwrap_err();
        assert_eq!(err.status(), Status::DatabaseError);
        assert!(store.inner.is_empty());

        store.fail_batch.store(true, Ordering::SeqCst);
        let err = tree.put("ns", "/q/r", &ValueInfo::permanent("v")).unwrap_err();
        assert!(err.is_retryable());
        assert!(store.inner.is_empty());

        store.fail_batch.store(false, Ordering::SeqCst);
        tree.put("ns", "/q/r", &ValueInfo::permanent("v")).unwrap();
        assert_eq!(tree.get("ns", "/q/r").unwrap().value, b"v");
    }

    #[test]
    fn test_concurrent_puts_share_ancestors() {
        let tree = Arc::new(tree());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tree = tree.clone();
                std::thread::spawn(move || {
                    for j in 0..20 {
                        let path = format!("/shared/dir/n{}-{}", i, j);
                        tree.put("ns", &path, &ValueInfo::permanent("v")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(keys(&tree, "ns", "/shared/dir").len(), 160);
        assert!(tree.get("ns", "/shared").unwrap().intermediate);
    }
}
