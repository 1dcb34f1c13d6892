//! Application orchestration: runs each configured upload spec in order and
//! aggregates the outcome of the run.

use crate::models::SyncConfig;
use crate::storage::{StorageClient, StorageService};
use crate::sync::{SpecReport, SyncEngine};
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Drives a full sync run. Specs execute strictly in declared order, each
/// completing (including its purge phase) before the next starts.
pub struct App {
    storage: Arc<dyn StorageService>,
    config: SyncConfig,
    concurrency: usize,
}

impl App {
    /// Build an app around an injected storage service.
    ///
    /// This is primarily useful for integration tests and local harnesses
    /// that need to inject mocks.
    pub fn with_storage(
        config: SyncConfig,
        storage: Arc<dyn StorageService>,
        concurrency: usize,
    ) -> Self {
        Self {
            storage,
            config,
            concurrency,
        }
    }

    /// Construct an app from a configuration file, building the production
    /// storage client from the resolved client options.
    pub async fn new(config_path: &Path, concurrency: usize) -> Result<Self> {
        let config = SyncConfig::from_file(config_path)?;
        let client_config = config.client_config();
        info!("Storage provider: {}", client_config.provider);

        let storage = Arc::new(StorageClient::new(&client_config).await?);
        Ok(Self::with_storage(config, storage, concurrency))
    }

    /// Run every upload spec. The run fails if any spec failed; the first
    /// error encountered is the one returned, and every per-file error is
    /// logged along the way.
    pub async fn run(&self) -> Result<Vec<SpecReport>> {
        let engine = SyncEngine::new(
            Arc::clone(&self.storage),
            self.concurrency,
            self.config.cdn_requested(),
        );

        let mut first_error: Option<Error> = None;
        let mut reports = Vec::with_capacity(self.config.upload.len());

        for spec in &self.config.upload {
            info!("Uploading into {}", spec.container);

            let outcome = match expand_sources(&spec.src) {
                Ok(files) => engine.sync_spec(spec, files).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(report) => {
                    info!(
                        "Finished {}: {} new, {} updated, {} skipped",
                        report.container, report.created, report.updated, report.skipped
                    );
                    if report.purge_failures > 0 {
                        info!(
                            "Purged {} of {} files from {}",
                            report.purged,
                            report.purged + report.purge_failures,
                            report.container
                        );
                    }
                    reports.push(report);
                }
                Err(e) => {
                    error!("Sync failed for {}: {}", spec.container, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }
}

/// Expand the spec's glob patterns into an ordered, deduplicated list of
/// local files. Directories are dropped; duplicate matches keep their first
/// position.
pub fn expand_sources(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns {
        let matches = glob::glob(pattern)
            .map_err(|e| Error::Config(format!("invalid glob pattern '{pattern}': {e}")))?;
        for entry in matches {
            let path = entry.map_err(|e| Error::Io(e.into_error()))?;
            if path.is_file() && seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }
    Ok(files)
}
