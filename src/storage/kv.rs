//! Flat key-value structure, for data that needs no directory semantics
//!
//! Keys are stored behind a single '.' marker, so storage order equals
//! literal key order and they never collide with tree keys (which start
//! with a digit).

use crate::common::utils::timestamp_now_millis;
use crate::common::{Error, Result};
use crate::storage::store::DataStore;
use crate::storage::structure::{NodeIter, Structure};
use crate::storage::value::{NodeRecord, ValueInfo};
use std::sync::Arc;

const KV_MARKER: u8 = b'.';

pub struct KvStructure {
    store: Arc<dyn DataStore>,
}

impl KvStructure {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

fn structured_key(key: &str) -> Vec<u8> {
    let mut structured = Vec::with_capacity(key.len() + 1);
    structured.push(KV_MARKER);
    structured.extend_from_slice(key.as_bytes());
    structured
}

fn origin_key(structured: &[u8]) -> &[u8] {
    structured.get(1..).unwrap_or_default()
}

impl Structure for KvStructure {
    fn get(&self, ns: &str, key: &str) -> Result<ValueInfo> {
        match self.store.get(ns, &structured_key(key))? {
            Some(raw) => Ok(NodeRecord::decode(&raw)?.into_info()),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    fn put(&self, ns: &str, key: &str, info: &ValueInfo) -> Result<()> {
        let record = NodeRecord::from_info(info, timestamp_now_millis());
        self.store.put(ns, &structured_key(key), &record.encode()?)
    }

    fn remove(&self, ns: &str, key: &str) -> Result<()> {
        self.store
            .remove(ns, &structured_key(key))
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(key.to_string()),
                other => other,
            })
    }

    /// Every key starting with `prefix`, in key order
    fn list<'a>(&'a self, ns: &str, prefix: &str) -> Result<NodeIter<'a>> {
        let it = self.store.iter(ns)?;
        Ok(NodeIter::new(it, structured_key(prefix), origin_key))
    }
}
