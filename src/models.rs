//! Data models and structures
//!
//! Defines the sync configuration (client options plus upload specs) and the
//! rules for defaulting providers, credentials, and CDN behavior.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Providers that support attaching a CDN distribution to a container.
const CDN_CAPABLE_PROVIDERS: &[&str] = &["rackspace"];

fn default_provider() -> String {
    "rackspace".to_string()
}

/// CDN purge list for an upload spec: object keys to invalidate after a
/// successful sync, plus optional notification addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct PurgeSpec {
    pub files: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
}

/// One configured unit of work: a container plus the local files destined
/// for it. Immutable for the duration of a sync run.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSpec {
    pub container: String,
    pub src: Vec<String>,
    #[serde(default)]
    pub dest: String,
    #[serde(rename = "stripcomponents")]
    pub strip_components: Option<usize>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub purge: Option<PurgeSpec>,
}

/// Full sync configuration: client options and the ordered upload specs.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub key: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    #[serde(rename = "cdnEndpoint")]
    pub cdn_endpoint: Option<String>,
    #[serde(rename = "enableCdn")]
    pub enable_cdn: Option<bool>,
    pub upload: Vec<UploadSpec>,
}

/// Resolved client options handed to the storage client. Built once per run;
/// the client constructed from it is shared by every operation.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub provider: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub cdn_endpoint: Option<String>,
    pub cdn_enabled: bool,
}

impl SyncConfig {
    /// Load and validate a configuration file (JSON).
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SyncConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.upload.is_empty() {
            return Err(Error::Config("no upload specs configured".to_string()));
        }
        for spec in &self.upload {
            if spec.container.trim().is_empty() {
                return Err(Error::Config(
                    "upload spec is missing a container name".to_string(),
                ));
            }
            if spec.src.is_empty() {
                return Err(Error::Config(format!(
                    "upload spec for '{}' has no src patterns",
                    spec.container
                )));
            }
        }
        Ok(())
    }

    /// Whether containers in this run should be CDN-enabled. Defaults to true
    /// for CDN-capable providers; `enableCdn: false` opts out.
    pub fn cdn_requested(&self) -> bool {
        CDN_CAPABLE_PROVIDERS.contains(&self.provider.as_str()) && self.enable_cdn != Some(false)
    }

    /// Resolve client options, letting environment variables override the
    /// in-file credentials.
    pub fn client_config(&self) -> ClientConfig {
        dotenvy::dotenv().ok();

        ClientConfig {
            provider: self.provider.clone(),
            username: std::env::var("CLOUDFILES_USER")
                .ok()
                .or_else(|| self.user.clone()),
            password: std::env::var("CLOUDFILES_PASS")
                .ok()
                .or_else(|| self.pass.clone()),
            api_key: std::env::var("CLOUDFILES_KEY")
                .ok()
                .or_else(|| self.key.clone()),
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            cdn_endpoint: self.cdn_endpoint.clone(),
            cdn_enabled: self.cdn_requested(),
        }
    }
}
