//! Server-side components and the context that owns them
//!
//! [`Orion`] wires one data store, one thread pool, the tree and flat
//! structures, the authenticator and the session manager together. It is
//! built explicitly and passed around; nothing lives in process globals.

pub mod authenticator;
pub mod session;

pub use authenticator::Authenticator;
pub use session::SessionManager;

use crate::common::thread_pool::ThreadPool;
use crate::common::{Config, Result};
use crate::storage::{DataStore, KvStructure, RocksStore, TreeStructure};
use std::sync::Arc;

/// Reserved namespace for system metadata, also the name of the internal user
pub const INTERNAL_NS: &str = "__internal__";

pub struct Orion {
    node_id: String,
    store: Arc<dyn DataStore>,
    pool: Arc<ThreadPool>,
    tree: Arc<TreeStructure>,
    kv: KvStructure,
    auth: Authenticator,
    sessions: SessionManager,
}

impl Orion {
    /// Open the RocksDB store configured in `config.store`
    pub fn open(config: &Config) -> Result<Self> {
        let store = RocksStore::open_with(&config.store.data_dir, &config.store)?;
        Self::with_store(Arc::new(store), config)
    }

    /// Build every component on top of an existing store
    pub fn with_store(store: Arc<dyn DataStore>, config: &Config) -> Result<Self> {
        config.validate()?;
        tracing::info!("Starting orion node: {}", config.node_id);
        tracing::info!("  Scheduler threads: {}", config.scheduler.threads);
        tracing::info!("  Session TTL: {}ms", config.session.ttl_ms);

        let pool = Arc::new(ThreadPool::new(config.scheduler.threads));
        let tree = Arc::new(TreeStructure::new(store.clone()));
        let kv = KvStructure::new(store.clone());
        let auth = Authenticator::open(tree.clone())?;
        let sessions = SessionManager::new(tree.clone(), pool.clone(), config.session.ttl());

        Ok(Self {
            node_id: config.node_id.clone(),
            store,
            pool,
            tree,
            kv,
            auth,
            sessions,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    pub fn tree(&self) -> &TreeStructure {
        &self.tree
    }

    pub fn kv(&self) -> &KvStructure {
        &self.kv
    }

    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Stop the scheduler; `wait` drains queued tasks first
    pub fn shutdown(&self, wait: bool) {
        tracing::info!(
            "Stopping orion node {} (scheduler profile: {})",
            self.node_id,
            self.pool.profiling_str()
        );
        self.pool.stop(wait);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemStore, Structure, ValueInfo};

    #[test]
    fn test_context_wiring() {
        let config = Config::default();
        let orion = Orion::with_store(Arc::new(MemStore::new()), &config).unwrap();
        assert_eq!(orion.node_id(), "orion-1");
        assert_eq!(orion.pool().threads(), 10);

        orion.auth().add("alice", "pw").unwrap();
        // credentials are ordinary tree nodes in the internal namespace
        assert!(orion.tree().get(INTERNAL_NS, "/user/alice").is_ok());

        let id = orion.sessions().open().unwrap();
        orion.sessions().put_temp(&id, "app", "/eph", b"x").unwrap();
        orion.kv().put("app", "flat", &ValueInfo::permanent("y")).unwrap();
        assert!(orion.tree().get("app", "/eph").unwrap().temp);

        orion.shutdown(true);
        assert!(orion.pool().is_stopped());
        assert!(orion.sessions().open().is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.scheduler.threads = 0;
        assert!(Orion::with_store(Arc::new(MemStore::new()), &config).is_err());
    }
}
