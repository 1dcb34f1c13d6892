//! Object-storage collaborator boundary.
//!
//! The sync engine talks to the backend only through [`StorageService`];
//! "not found" outcomes are surfaced as `None` so callers never have to
//! inspect backend error codes.

pub mod client;
pub mod mock;

pub use client::StorageClient;
pub use mock::MockStorageClient;

use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

/// A named top-level grouping for stored objects (a bucket, in S3 terms).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    pub cdn_enabled: bool,
}

/// Remote object metadata used for change detection. The content tag is an
/// opaque digest supplied by the backend (an etag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub key: String,
    pub content_tag: String,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Look up a container by name; `None` when it does not exist.
    async fn get_container(&self, name: &str) -> Result<Option<Container>>;

    async fn create_container(&self, name: &str) -> Result<Container>;

    /// Attach a CDN distribution to the container. Idempotent.
    async fn enable_cdn(&self, container: &Container) -> Result<Container>;

    /// Fetch remote metadata for one key; `None` when the object is absent.
    async fn get_file(&self, container: &Container, key: &str) -> Result<Option<RemoteFile>>;

    /// Stream a local file to the remote key with the given headers attached.
    /// Returns only after the backend confirms the write.
    async fn upload(
        &self,
        container: &Container,
        key: &str,
        local: &Path,
        headers: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Invalidate one key from the CDN edge cache, optionally notifying the
    /// given addresses on completion.
    async fn purge_file_from_cdn(
        &self,
        container: &Container,
        key: &str,
        emails: &[String],
    ) -> Result<()>;
}
