//! Structured data i/o on top of a [`DataStore`](crate::storage::DataStore)

use crate::common::{Error, Result};
use crate::storage::store::DataIterator;
use crate::storage::value::{NodeRecord, ValueInfo};

/// One listed node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    /// Original key (full path for trees)
    pub key: String,
    pub info: ValueInfo,
}

/// Capability set shared by the tree and flat structures
pub trait Structure: Send + Sync {
    fn get(&self, ns: &str, key: &str) -> Result<ValueInfo>;

    fn put(&self, ns: &str, key: &str, info: &ValueInfo) -> Result<()>;

    fn remove(&self, ns: &str, key: &str) -> Result<()>;

    /// Entries under `key`; the meaning of "under" depends on the structure.
    /// Forward-only and single pass.
    fn list<'a>(&'a self, ns: &str, key: &str) -> Result<NodeIter<'a>>;
}

/// Iterator over every stored record whose key starts with a given prefix
pub struct NodeIter<'a> {
    it: Box<dyn DataIterator + 'a>,
    prefix: Vec<u8>,
    origin_key: fn(&[u8]) -> &[u8],
    finished: bool,
}

impl<'a> NodeIter<'a> {
    /// Seek `it` to `prefix` and bound the scan by it.
    /// `origin_key` turns a storage key back into the caller's key.
    pub fn new(
        mut it: Box<dyn DataIterator + 'a>,
        prefix: Vec<u8>,
        origin_key: fn(&[u8]) -> &[u8],
    ) -> Self {
        it.seek(&prefix);
        Self {
            it,
            prefix,
            origin_key,
            finished: false,
        }
    }
}

impl Iterator for NodeIter<'_> {
    type Item = Result<NodeEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if !self.it.valid() {
            self.finished = true;
            // surface a backend failure once, then stop
            return self.it.status().err().map(Err);
        }
        if !self.it.key().starts_with(&self.prefix) {
            self.finished = true;
            return None;
        }

        let key = String::from_utf8_lossy((self.origin_key)(self.it.key())).into_owned();
        let item = NodeRecord::decode(self.it.value())
            .map(|record| NodeEntry {
                key: key.clone(),
                info: record.into_info(),
            })
            .map_err(|e| Error::Invalid(format!("{}: {}", key, e)));
        self.it.next();
        Some(item)
    }
}
