//! Error types for orion

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Storage Errors ===
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid: {0}")]
    Invalid(String),

    #[error("Already exists: {0}")]
    Existed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire-level status codes returned to the RPC layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    DatabaseError = 1,
    NotFound = 2,
    Invalid = 3,
    Existed = 4,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Status of an operation outcome
    pub fn of<T>(result: &Result<T>) -> Status {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => e.status(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::DatabaseError => "DATABASE_ERROR",
            Status::NotFound => "NOT_FOUND",
            Status::Invalid => "INVALID",
            Status::Existed => "EXISTED",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Error {
    /// Map to the status taxonomy
    pub fn status(&self) -> Status {
        match self {
            Error::NotFound(_) => Status::NotFound,
            Error::Invalid(_) | Error::Serialization(_) | Error::InvalidConfig(_) => Status::Invalid,
            Error::Existed(_) => Status::Existed,
            Error::Io(_) | Error::RocksDb(_) | Error::Database(_) | Error::Internal(_) => {
                Status::DatabaseError
            }
        }
    }

    /// Store failures are surfaced verbatim; every single write is an
    /// idempotent overwrite, so the caller may retry the whole call.
    pub fn is_retryable(&self) -> bool {
        self.status() == Status::DatabaseError
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
