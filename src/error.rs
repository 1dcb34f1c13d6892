//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Container provisioning error: {0}")]
    Provision(String),

    #[error("Remote lookup error for {key}: {message}")]
    Lookup { key: String, message: String },

    #[error("Upload error for {key}: {message}")]
    Upload { key: String, message: String },

    #[error("Purge error for {key}: {message}")]
    Purge { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
