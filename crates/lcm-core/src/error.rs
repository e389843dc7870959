//! Error types for the license state subsystem
//!
//! Business rejections (cooldown, conflicting license) are not errors; they are
//! reported through [`crate::licensing::Registration`]. This type only carries
//! environment faults and invalid input.

use thiserror::Error;

/// Result type alias for LCM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the license state subsystem
#[derive(Error, Debug)]
pub enum Error {
    /// File system errors that survived the retry policy
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The named process lock could not be created or acquired
    #[error("Process lock error: {0}")]
    Lock(String),

    /// A license key could not be parsed
    #[error("License error: {0}")]
    License(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Background task infrastructure errors
    #[error("Task error: {0}")]
    Task(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a process lock error
    pub fn lock(msg: impl Into<String>) -> Self {
        Self::Lock(msg.into())
    }

    /// Create a license parsing error
    pub fn license(msg: impl Into<String>) -> Self {
        Self::License(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a task error
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }
}

