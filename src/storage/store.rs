//! Byte-ordered key-value store abstraction
//!
//! Every backend partitions data by namespace. The namespace is embedded as a
//! key prefix: `/<ns>/<key>`, so the default (empty) namespace reads `//<key>`.
//! Iterators never leave the namespace they were opened on, and the keys they
//! expose have the prefix removed.

use crate::common::{Error, Result};

/// A single mutation inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Forward-only cursor over one namespace
pub trait DataIterator {
    /// Position at the first key equal to or greater than `key`.
    /// Must be called before any other method.
    fn seek(&mut self, key: &[u8]);

    fn valid(&self) -> bool;

    /// Key without namespace prefix; empty when not valid
    fn key(&self) -> &[u8];

    /// Empty when not valid
    fn value(&self) -> &[u8];

    fn next(&mut self);

    /// Error hit while iterating, if any
    fn status(&self) -> Result<()>;
}

/// Trait for key-value storage backends
pub trait DataStore: Send + Sync {
    fn get(&self, ns: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, ns: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Fails with NotFound when the key is absent
    fn remove(&self, ns: &str, key: &[u8]) -> Result<()>;

    /// Apply all operations atomically
    fn write_batch(&self, ns: &str, ops: Vec<BatchOp>) -> Result<()>;

    fn iter<'a>(&'a self, ns: &str) -> Result<Box<dyn DataIterator + 'a>>;
}

/// Prefix shared by every key of a namespace
pub fn ns_prefix(ns: &str) -> Result<Vec<u8>> {
    if ns.contains('/') {
        return Err(Error::Invalid(format!(
            "namespace must not contain '/': {}",
            ns
        )));
    }
    let mut prefix = Vec::with_capacity(ns.len() + 2);
    prefix.push(b'/');
    prefix.extend_from_slice(ns.as_bytes());
    prefix.push(b'/');
    Ok(prefix)
}

/// Full backing key of `key` inside `ns`
pub fn key_in_ns(ns: &str, key: &[u8]) -> Result<Vec<u8>> {
    let mut full = ns_prefix(ns)?;
    full.extend_from_slice(key);
    Ok(full)
}
