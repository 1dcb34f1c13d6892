//! The sync engine: container provisioning, content-diff upload decisions,
//! and bounded-concurrency execution.
//!
//! Within one upload spec, file-level work runs on a fixed pool of workers
//! pulling from a shared queue. The first fatal error is latched and stops
//! further dequeuing; work already picked up drains to completion rather
//! than being aborted, so no upload is left half-written.

use crate::hash::hash_file;
use crate::models::{PurgeSpec, UploadSpec};
use crate::paths::remote_key;
use crate::storage::{Container, StorageService};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Maximum simultaneously in-flight file operations per spec.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Outcome of one file's diff-and-upload decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
    Skipped,
}

/// Aggregate outcome of one upload spec.
#[derive(Debug, Clone, Default)]
pub struct SpecReport {
    pub container: String,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub purged: usize,
    pub purge_failures: usize,
}

#[derive(Clone)]
pub struct SyncEngine {
    storage: Arc<dyn StorageService>,
    concurrency: usize,
    enable_cdn: bool,
}

impl SyncEngine {
    pub fn new(storage: Arc<dyn StorageService>, concurrency: usize, enable_cdn: bool) -> Self {
        Self {
            storage,
            concurrency: concurrency.max(1),
            enable_cdn,
        }
    }

    /// Ensure the named container exists and has the requested CDN state.
    ///
    /// Every transition is idempotent and skipped when already satisfied.
    /// Any failure here is fatal to the spec, including a CDN-enable failure
    /// on a container that already existed.
    pub async fn ensure_container(&self, name: &str, want_cdn: bool) -> Result<Container> {
        match self.storage.get_container(name).await? {
            None => {
                info!("Creating container: {}", name);
                let container = self.storage.create_container(name).await?;
                if want_cdn {
                    info!("CDN enabling container: {}", name);
                    self.storage.enable_cdn(&container).await
                } else {
                    Ok(container)
                }
            }
            Some(container) if want_cdn && !container.cdn_enabled => {
                info!("CDN enabling container: {}", name);
                self.storage.enable_cdn(&container).await
            }
            Some(container) => Ok(container),
        }
    }

    /// Decide create/update/skip for one local file and perform the upload
    /// in the same call, so no second lookup races the decision.
    async fn sync_file(
        &self,
        local: &Path,
        container: &Container,
        spec: &UploadSpec,
    ) -> Result<SyncAction> {
        let local_name = local.to_string_lossy();
        let key = remote_key(&local_name, &spec.dest, spec.strip_components);
        let local_hash = hash_file(local).await?;

        match self.storage.get_file(container, &key).await? {
            None => {
                info!("Uploading {} to {} (NEW)", local_name, container.name);
                self.storage
                    .upload(container, &key, local, &spec.headers)
                    .await?;
                Ok(SyncAction::Created)
            }
            Some(remote) if remote.content_tag != local_hash => {
                info!("Updating {} in {} (MD5 diff)", local_name, container.name);
                self.storage
                    .upload(container, &key, local, &spec.headers)
                    .await?;
                Ok(SyncAction::Updated)
            }
            Some(_) => {
                info!("Skipping {} in {} (MD5 match)", local_name, container.name);
                Ok(SyncAction::Skipped)
            }
        }
    }

    /// Run one upload spec end-to-end: provision the container, diff-and-
    /// upload every file under the worker pool, then purge if the spec asks
    /// for it and every upload succeeded.
    pub async fn sync_spec(&self, spec: &UploadSpec, files: Vec<PathBuf>) -> Result<SpecReport> {
        let container = Arc::new(
            self.ensure_container(&spec.container, self.enable_cdn)
                .await?,
        );
        info!(
            "Syncing {} files to container: {}",
            files.len(),
            container.name
        );

        let spec = Arc::new(spec.clone());
        let workers = self.concurrency.min(files.len()).max(1);
        let queue = Arc::new(Mutex::new(VecDeque::from(files)));
        let first_error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
        let tally = Arc::new(Mutex::new(SpecReport {
            container: spec.container.clone(),
            ..SpecReport::default()
        }));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let engine = self.clone();
            let container = Arc::clone(&container);
            let spec = Arc::clone(&spec);
            let queue = Arc::clone(&queue);
            let first_error = Arc::clone(&first_error);
            let tally = Arc::clone(&tally);

            handles.push(tokio::spawn(async move {
                loop {
                    // Once an error is latched, stop admitting new files and
                    // let the pool drain.
                    let next = if first_error.lock().await.is_some() {
                        None
                    } else {
                        queue.lock().await.pop_front()
                    };
                    let Some(path) = next else { break };

                    match engine.sync_file(&path, &container, &spec).await {
                        Ok(action) => {
                            let mut tally = tally.lock().await;
                            match action {
                                SyncAction::Created => tally.created += 1,
                                SyncAction::Updated => tally.updated += 1,
                                SyncAction::Skipped => tally.skipped += 1,
                            }
                        }
                        Err(e) => {
                            error!("Failed to sync {}: {}", path.display(), e);
                            let mut slot = first_error.lock().await;
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                        }
                    }
                }
            }));
        }
        for handle in handles {
            handle
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        }

        if let Some(err) = first_error.lock().await.take() {
            return Err(err);
        }

        let mut report = tally.lock().await.clone();
        if let Some(purge) = &spec.purge {
            let (purged, failures) = self.purge_spec(&container, purge).await;
            report.purged = purged;
            report.purge_failures = failures;
        }
        Ok(report)
    }

    /// Purge the spec's file list from the CDN under the same pool
    /// discipline. Purging is best-effort cache maintenance: failures are
    /// logged per file and never stop the remaining purges.
    async fn purge_spec(&self, container: &Arc<Container>, purge: &PurgeSpec) -> (usize, usize) {
        info!("Purging files from {}", container.name);

        let workers = self.concurrency.min(purge.files.len()).max(1);
        let queue = Arc::new(Mutex::new(VecDeque::from(purge.files.clone())));
        let emails = Arc::new(purge.emails.clone());
        let purged = Arc::new(Mutex::new(0usize));
        let failures = Arc::new(Mutex::new(0usize));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let storage = Arc::clone(&self.storage);
            let container = Arc::clone(container);
            let queue = Arc::clone(&queue);
            let emails = Arc::clone(&emails);
            let purged = Arc::clone(&purged);
            let failures = Arc::clone(&failures);

            handles.push(tokio::spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(name) = next else { break };

                    info!("Purging {}", name);
                    match storage.purge_file_from_cdn(&container, &name, &emails).await {
                        Ok(()) => *purged.lock().await += 1,
                        Err(e) => {
                            warn!("{}", e);
                            *failures.lock().await += 1;
                        }
                    }
                }
            }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Purge worker failed: {}", e);
            }
        }

        let purged = *purged.lock().await;
        let failures = *failures.lock().await;
        (purged, failures)
    }
}
