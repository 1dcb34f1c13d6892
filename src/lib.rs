//! Sync a local file tree with cloud storage containers.
//!
//! Containers are created on demand (optionally CDN-enabled), files are
//! uploaded only when their content hash differs from the remote etag, and
//! previously-uploaded keys can be purged from the CDN edge cache.

pub mod app;
pub mod error;
pub mod hash;
pub mod models;
pub mod paths;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
