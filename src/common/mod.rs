//! Common utilities and types shared across orion

pub mod config;
pub mod error;
pub mod thread_pool;
pub mod utils;

pub use config::{Config, SchedulerConfig, SessionConfig, StoreConfig};
pub use error::{Error, Result, Status};
pub use thread_pool::{CancelResult, Profile, TaskId, ThreadPool};
pub use utils::{format_timestamp_millis, timestamp_now_millis};
