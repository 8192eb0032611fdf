//! Storage layer
//!
//! A byte-ordered, namespace-partitioned [`DataStore`] at the bottom
//! (RocksDB or in-memory), and two [`Structure`]s on top of it:
//! - [`TreeStructure`]: hierarchical paths with directory semantics
//! - [`KvStructure`]: plain keys, literal order

pub mod codec;
pub mod kv;
pub mod memory;
pub mod rocks;
pub mod store;
pub mod structure;
pub mod tree;
pub mod value;

pub use kv::KvStructure;
pub use memory::MemStore;
pub use rocks::RocksStore;
pub use store::{BatchOp, DataIterator, DataStore};
pub use structure::{NodeEntry, NodeIter, Structure};
pub use tree::TreeStructure;
pub use value::{NodeRecord, NodeType, ValueInfo};
