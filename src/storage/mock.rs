use super::{Container, RemoteFile, StorageService};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory storage backend for tests and harnesses.
///
/// Tracks container-level calls in order, counts uploads, records purge
/// attempts, and keeps a high-water mark of concurrently in-flight uploads
/// so concurrency bounds can be asserted.
#[derive(Clone, Default)]
pub struct MockStorageClient {
    containers: Arc<Mutex<HashMap<String, bool>>>,
    objects: Arc<Mutex<HashMap<(String, String), String>>>,
    calls: Arc<Mutex<Vec<String>>>,
    upload_count: Arc<Mutex<usize>>,
    purge_attempts: Arc<Mutex<Vec<String>>>,
    fail_uploads: Arc<Mutex<HashSet<String>>>,
    fail_lookups: Arc<Mutex<HashSet<String>>>,
    fail_purges: Arc<Mutex<HashSet<String>>>,
    fail_enable_cdn: Arc<Mutex<bool>>,
    in_flight: Arc<Mutex<usize>>,
    max_in_flight: Arc<Mutex<usize>>,
}

impl MockStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(self, name: &str, cdn_enabled: bool) -> Self {
        self.containers
            .lock()
            .unwrap()
            .insert(name.to_string(), cdn_enabled);
        self
    }

    pub fn with_object(self, container: &str, key: &str, content_tag: &str) -> Self {
        self.objects.lock().unwrap().insert(
            (container.to_string(), key.to_string()),
            content_tag.to_string(),
        );
        self
    }

    pub fn with_upload_failure(self, key: &str) -> Self {
        self.fail_uploads.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn with_lookup_failure(self, key: &str) -> Self {
        self.fail_lookups.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn with_purge_failure(self, key: &str) -> Self {
        self.fail_purges.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn with_enable_cdn_failure(self) -> Self {
        *self.fail_enable_cdn.lock().unwrap() = true;
        self
    }

    /// Ordered log of container-level calls, as `"op:container"` entries.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn purge_attempts(&self) -> Vec<String> {
        self.purge_attempts.lock().unwrap().clone()
    }

    pub fn object_tag(&self, container: &str, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(&(container.to_string(), key.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Highest number of uploads observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        *self.max_in_flight.lock().unwrap()
    }

    fn record(&self, op: &str, name: &str) {
        self.calls.lock().unwrap().push(format!("{op}:{name}"));
    }

    fn enter_upload(&self) {
        let mut in_flight = self.in_flight.lock().unwrap();
        *in_flight += 1;
        let mut max = self.max_in_flight.lock().unwrap();
        if *in_flight > *max {
            *max = *in_flight;
        }
    }

    fn exit_upload(&self) {
        *self.in_flight.lock().unwrap() -= 1;
    }
}

#[async_trait]
impl StorageService for MockStorageClient {
    async fn get_container(&self, name: &str) -> Result<Option<Container>> {
        self.record("get_container", name);
        Ok(self
            .containers
            .lock()
            .unwrap()
            .get(name)
            .map(|&cdn_enabled| Container {
                name: name.to_string(),
                cdn_enabled,
            }))
    }

    async fn create_container(&self, name: &str) -> Result<Container> {
        self.record("create_container", name);
        self.containers
            .lock()
            .unwrap()
            .insert(name.to_string(), false);
        Ok(Container {
            name: name.to_string(),
            cdn_enabled: false,
        })
    }

    async fn enable_cdn(&self, container: &Container) -> Result<Container> {
        self.record("enable_cdn", &container.name);
        if *self.fail_enable_cdn.lock().unwrap() {
            return Err(Error::Provision(format!(
                "injected CDN-enable failure for {}",
                container.name
            )));
        }
        self.containers
            .lock()
            .unwrap()
            .insert(container.name.clone(), true);
        Ok(Container {
            name: container.name.clone(),
            cdn_enabled: true,
        })
    }

    async fn get_file(&self, container: &Container, key: &str) -> Result<Option<RemoteFile>> {
        if self.fail_lookups.lock().unwrap().contains(key) {
            return Err(Error::Lookup {
                key: key.to_string(),
                message: "injected lookup failure".to_string(),
            });
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(container.name.clone(), key.to_string()))
            .map(|tag| RemoteFile {
                key: key.to_string(),
                content_tag: tag.clone(),
            }))
    }

    async fn upload(
        &self,
        container: &Container,
        key: &str,
        local: &Path,
        _headers: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.enter_upload();
        // Give concurrent uploads a window to overlap so the high-water
        // mark is meaningful.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = if self.fail_uploads.lock().unwrap().contains(key) {
            Err(Error::Upload {
                key: key.to_string(),
                message: "injected upload failure".to_string(),
            })
        } else {
            match std::fs::read(local) {
                Ok(bytes) => {
                    let tag = format!("{:x}", md5::compute(&bytes));
                    self.objects
                        .lock()
                        .unwrap()
                        .insert((container.name.clone(), key.to_string()), tag);
                    *self.upload_count.lock().unwrap() += 1;
                    Ok(())
                }
                Err(e) => Err(Error::Io(e)),
            }
        };
        // The gauge must decrement on every path, failures included.
        self.exit_upload();
        result
    }

    async fn purge_file_from_cdn(
        &self,
        _container: &Container,
        key: &str,
        _emails: &[String],
    ) -> Result<()> {
        self.purge_attempts.lock().unwrap().push(key.to_string());
        if self.fail_purges.lock().unwrap().contains(key) {
            return Err(Error::Purge {
                key: key.to_string(),
                message: "injected purge failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            cdn_enabled: false,
        }
    }

    #[tokio::test]
    async fn test_mock_upload_stores_md5_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello world").unwrap();

        let mock = MockStorageClient::new().with_container("assets", false);
        mock.upload(&container("assets"), "a.txt", &path, &BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(
            mock.object_tag("assets", "a.txt").as_deref(),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3")
        );
        assert_eq!(mock.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_get_file_distinguishes_absent() {
        let mock = MockStorageClient::new()
            .with_container("assets", false)
            .with_object("assets", "present.js", "abc");

        let found = mock
            .get_file(&container("assets"), "present.js")
            .await
            .unwrap();
        assert_eq!(found.unwrap().content_tag, "abc");

        let absent = mock
            .get_file(&container("assets"), "missing.js")
            .await
            .unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_mock_records_container_call_order() {
        let mock = MockStorageClient::new();

        assert!(mock.get_container("assets").await.unwrap().is_none());
        let created = mock.create_container("assets").await.unwrap();
        mock.enable_cdn(&created).await.unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                "get_container:assets",
                "create_container:assets",
                "enable_cdn:assets"
            ]
        );
        let refreshed = mock.get_container("assets").await.unwrap().unwrap();
        assert!(refreshed.cdn_enabled);
    }

    #[tokio::test]
    async fn test_mock_failed_read_releases_in_flight_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockStorageClient::new().with_container("assets", false);

        let missing = dir.path().join("missing.txt");
        let err = mock
            .upload(&container("assets"), "missing.txt", &missing, &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        let present = dir.path().join("present.txt");
        fs::write(&present, b"data").unwrap();
        mock.upload(&container("assets"), "present.txt", &present, &BTreeMap::new())
            .await
            .unwrap();

        // Sequential uploads never overlap, so a leaked slot from the
        // failed read would show up as a high-water mark of two.
        assert_eq!(mock.max_in_flight(), 1);
        assert_eq!(mock.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_enable_cdn_failure_injection() {
        let mock = MockStorageClient::new().with_enable_cdn_failure();
        let err = mock.enable_cdn(&container("assets")).await.unwrap_err();
        assert!(matches!(err, Error::Provision(_)));
    }
}
