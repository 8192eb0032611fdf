//! Sessions and the temp nodes they own
//!
//! Every open session holds one pending delay task on the thread pool. When
//! it fires, or when the session is closed, the temp nodes written through the
//! session are removed deepest first. Keep-alive cancels the pending task and
//! schedules a new one.

use crate::common::thread_pool::{CancelResult, TaskId, ThreadPool};
use crate::common::{Error, Result};
use crate::storage::{Structure, TreeStructure, ValueInfo};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

struct Session {
    timer: TaskId,
    /// (namespace, path) of temp nodes written by this session
    nodes: BTreeSet<(String, String)>,
}

struct Inner {
    tree: Arc<TreeStructure>,
    pool: Arc<ThreadPool>,
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(tree: Arc<TreeStructure>, pool: Arc<ThreadPool>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tree,
                pool,
                ttl,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Open a session that expires after the TTL unless kept alive
    pub fn open(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.inner.lock();
        let timer = self.inner.schedule_expiry(&id)?;
        sessions.insert(
            id.clone(),
            Session {
                timer,
                nodes: BTreeSet::new(),
            },
        );
        tracing::debug!(session = %id, "session opened");
        Ok(id)
    }

    /// Push the expiry of a session back by one TTL
    pub fn keep_alive(&self, id: &str) -> Result<()> {
        let mut sessions = self.inner.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;
        match self.inner.pool.cancel_task(session.timer, false) {
            CancelResult::Cancelled => {
                session.timer = self.inner.schedule_expiry(id)?;
                Ok(())
            }
            _ => Err(Error::NotFound(format!("session {} is expiring", id))),
        }
    }

    /// Write a temp node owned by the session
    pub fn put_temp(&self, id: &str, ns: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut sessions = self.inner.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;
        self.inner
            .tree
            .put(ns, key, &ValueInfo::temp(value, id))?;
        session.nodes.insert((ns.to_string(), key.to_string()));
        Ok(())
    }

    /// Close a session and remove its temp nodes
    pub fn close(&self, id: &str) -> Result<()> {
        let session = self
            .inner
            .lock()
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;
        // a concurrently firing expiry will find the session gone
        self.inner.pool.cancel_task(session.timer, false);
        self.inner.cleanup(id, session.nodes);
        tracing::debug!(session = %id, "session closed");
        Ok(())
    }

    pub fn is_alive(&self, id: &str) -> bool {
        self.inner.lock().contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn schedule_expiry(self: &Arc<Self>, id: &str) -> Result<TaskId> {
        let weak = Arc::downgrade(self);
        let id_owned = id.to_string();
        let timer = self.pool.delay_task(self.ttl.as_millis() as u64, move || {
            if let Some(inner) = weak.upgrade() {
                inner.expire(&id_owned);
            }
        });
        if timer == 0 {
            return Err(Error::Internal("scheduler stopped".into()));
        }
        Ok(timer)
    }

    fn expire(&self, id: &str) {
        let Some(session) = self.lock().remove(id) else {
            return;
        };
        tracing::info!(session = %id, nodes = session.nodes.len(), "session expired");
        self.cleanup(id, session.nodes);
    }

    /// Remove the session's temp nodes, children before parents. Nodes that
    /// were overwritten by someone else or still have children are kept.
    fn cleanup(&self, id: &str, nodes: BTreeSet<(String, String)>) {
        let mut nodes: Vec<_> = nodes.into_iter().collect();
        nodes.sort_by_key(|(_, path)| std::cmp::Reverse(path.matches('/').count()));

        for (ns, path) in nodes {
            match self.tree.get(&ns, &path) {
                Ok(info) if info.temp && info.owner.as_deref() == Some(id) => {}
                Ok(_) | Err(Error::NotFound(_)) => continue,
                Err(e) => {
                    tracing::warn!(session = %id, ns = %ns, path = %path, "temp node lookup failed: {}", e);
                    continue;
                }
            }
            match self.tree.remove(&ns, &path) {
                Ok(()) | Err(Error::NotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(session = %id, ns = %ns, path = %path, "temp node not removed: {}", e);
                }
            }
        }
    }
}
