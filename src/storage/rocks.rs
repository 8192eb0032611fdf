//! RocksDB-backed data store
//!
//! All namespaces share the default column family; the namespace prefix keeps
//! each one contiguous so a raw iterator can scan it in key order.

use crate::common::{Error, Result, StoreConfig};
use crate::storage::store::{key_in_ns, ns_prefix, BatchOp, DataIterator, DataStore};
use rocksdb::{BlockBasedOptions, DBCompressionType, DBRawIterator, Options, WriteBatch, DB};
use std::path::Path;

pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a store with default options
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &StoreConfig::default())
    }

    /// Open or create a store tuned by `config`
    pub fn open_with(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.set_compression_type(if config.compression {
            DBCompressionType::Lz4
        } else {
            DBCompressionType::None
        });
        if config.write_buffer_size_mb > 0 {
            opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        }
        if config.block_size_kb > 0 {
            let mut table = BlockBasedOptions::default();
            table.set_block_size(config.block_size_kb * 1024);
            opts.set_block_based_table_factory(&table);
        }

        tracing::info!(
            "[data]: opening {} (block_size_kb: {}, write_buffer_size_mb: {})",
            path.as_ref().display(),
            config.block_size_kb,
            config.write_buffer_size_mb
        );
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    /// Flush to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl DataStore for RocksStore {
    fn get(&self, ns: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key_in_ns(ns, key)?)?)
    }

    fn put(&self, ns: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.put(key_in_ns(ns, key)?, value)?;
        Ok(())
    }

    fn remove(&self, ns: &str, key: &[u8]) -> Result<()> {
        let full = key_in_ns(ns, key)?;
        if self.db.get_pinned(&full)?.is_none() {
            return Err(Error::NotFound(String::from_utf8_lossy(key).into_owned()));
        }
        self.db.delete(full)?;
        Ok(())
    }

    fn write_batch(&self, ns: &str, ops: Vec<BatchOp>) -> Result<()> {
        let prefix = ns_prefix(ns)?;
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    batch.put([prefix.as_slice(), &key].concat(), value);
                }
                BatchOp::Delete { key } => {
                    batch.delete([prefix.as_slice(), &key].concat());
                }
            }
        }
        self.db.write(batch)?;
        Ok(())
    }

    fn iter<'a>(&'a self, ns: &str) -> Result<Box<dyn DataIterator + 'a>> {
        Ok(Box::new(RocksIterator {
            it: self.db.raw_iterator(),
            prefix: ns_prefix(ns)?,
        }))
    }
}

struct RocksIterator<'a> {
    it: DBRawIterator<'a>,
    prefix: Vec<u8>,
}

impl DataIterator for RocksIterator<'_> {
    fn seek(&mut self, key: &[u8]) {
        self.it.seek([self.prefix.as_slice(), key].concat());
    }

    fn valid(&self) -> bool {
        self.it.valid()
            && self
                .it
                .key()
                .is_some_and(|k| k.starts_with(&self.prefix))
    }

    fn key(&self) -> &[u8] {
        if !self.valid() {
            return &[];
        }
        self.it
            .key()
            .map(|k| &k[self.prefix.len()..])
            .unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        if !self.valid() {
            return &[];
        }
        self.it.value().unwrap_or_default()
    }

    fn next(&mut self) {
        if self.it.valid() {
            self.it.next();
        }
    }

    fn status(&self) -> Result<()> {
        self.it.status().map_err(Error::from)
    }
}
