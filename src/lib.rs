//! # orion
//!
//! The storage and scheduling core of a coordination service:
//! - Namespaced, hierarchical tree of nodes with directory listing
//! - Flat key/value structure sharing the same store
//! - Token-based user registry kept in a reserved namespace
//! - Thread pool with priority, delayed and cancellable tasks
//! - Sessions owning temp nodes that vanish when the session expires
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                   Orion                       │
//! │  Authenticator   SessionManager ── ThreadPool │
//! └───────┬───────────────┬───────────────────────┘
//!         │               │
//! ┌───────▼───────────────▼───┐   ┌──────────────┐
//! │      TreeStructure        │   │ KvStructure  │
//! │  "<level>#<path>" keys    │   │  "." + key   │
//! └─────────────┬─────────────┘   └──────┬───────┘
//!               │   "/<ns>/" prefix      │
//!         ┌─────▼────────────────────────▼─────┐
//!         │   DataStore (RocksDB | memory)     │
//!         └────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! orion --data-dir ./orion-data --ns app put /services/api 10.0.0.1:8080
//! orion --ns app ls /services --json
//! orion user add alice s3cret
//! ```

pub mod common;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use common::{Config, Error, Result, Status};
pub use server::Orion;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
