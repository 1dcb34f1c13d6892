use super::{Container, RemoteFile, StorageService};
use crate::models::ClientConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::Region, types::ObjectCannedAcl, Client as S3Client};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Production storage client.
///
/// Container and object operations go over the S3-compatible API; CDN
/// enablement and purging go through the provider's CDN HTTP API, which the
/// S3 wire protocol does not cover.
pub struct StorageClient {
    s3: S3Client,
    http: reqwest::Client,
    cdn_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CdnStatus {
    cdn_enabled: bool,
}

/// Characters that cannot appear raw inside a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode an object key for use in a URL path, keeping its `/`
/// separators intact.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

impl StorageClient {
    pub async fn new(config: &ClientConfig) -> Result<Self> {
        let access_key = config
            .username
            .clone()
            .ok_or_else(|| Error::Config("storage credentials require 'user'".to_string()))?;
        let secret = config
            .api_key
            .clone()
            .or_else(|| config.password.clone())
            .ok_or_else(|| {
                Error::Config("storage credentials require 'key' or 'pass'".to_string())
            })?;

        let credentials =
            aws_sdk_s3::config::Credentials::new(access_key, secret, None, None, "cloudfiles-sync");

        let region = config.region.clone().unwrap_or_else(|| "us-east-1".to_string());
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;

        Ok(Self {
            s3: S3Client::new(&sdk_config),
            http: reqwest::Client::new(),
            cdn_endpoint: config.cdn_endpoint.clone(),
        })
    }

    fn cdn_container_url(&self, base: &str, name: &str) -> String {
        format!("{}/containers/{}", base.trim_end_matches('/'), name)
    }

    /// CDN state for an existing container. Without a configured CDN
    /// endpoint the container is reported as not CDN-enabled.
    async fn cdn_state(&self, name: &str) -> Result<bool> {
        let Some(base) = &self.cdn_endpoint else {
            return Ok(false);
        };

        let response = self
            .http
            .get(self.cdn_container_url(base, name))
            .send()
            .await
            .map_err(|e| Error::Provision(format!("CDN status lookup failed for {name}: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let status: CdnStatus = response
            .error_for_status()
            .map_err(|e| Error::Provision(format!("CDN status lookup failed for {name}: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Provision(format!("CDN status lookup failed for {name}: {e}")))?;

        Ok(status.cdn_enabled)
    }
}

#[async_trait]
impl StorageService for StorageClient {
    async fn get_container(&self, name: &str) -> Result<Option<Container>> {
        match self.s3.head_bucket().bucket(name).send().await {
            Ok(_) => {
                let cdn_enabled = self.cdn_state(name).await?;
                Ok(Some(Container {
                    name: name.to_string(),
                    cdn_enabled,
                }))
            }
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(HeadBucketError::is_not_found)
                {
                    return Ok(None);
                }
                Err(Error::Provision(format!(
                    "container lookup failed for {name}: {err}"
                )))
            }
        }
    }

    async fn create_container(&self, name: &str) -> Result<Container> {
        self.s3
            .create_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(|e| Error::Provision(format!("failed to create container {name}: {e}")))?;

        Ok(Container {
            name: name.to_string(),
            cdn_enabled: false,
        })
    }

    async fn enable_cdn(&self, container: &Container) -> Result<Container> {
        let base = self.cdn_endpoint.as_ref().ok_or_else(|| {
            Error::Provision(format!(
                "cannot CDN-enable {}: no CDN endpoint configured",
                container.name
            ))
        })?;

        self.http
            .put(self.cdn_container_url(base, &container.name))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                Error::Provision(format!("failed to CDN-enable {}: {e}", container.name))
            })?;

        Ok(Container {
            name: container.name.clone(),
            cdn_enabled: true,
        })
    }

    async fn get_file(&self, container: &Container, key: &str) -> Result<Option<RemoteFile>> {
        match self
            .s3
            .head_object()
            .bucket(&container.name)
            .key(key)
            .send()
            .await
        {
            Ok(response) => {
                // Backends quote the etag header value.
                let content_tag = response
                    .e_tag()
                    .unwrap_or_default()
                    .trim_matches('"')
                    .to_string();
                Ok(Some(RemoteFile {
                    key: key.to_string(),
                    content_tag,
                }))
            }
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found)
                {
                    return Ok(None);
                }
                Err(Error::Lookup {
                    key: key.to_string(),
                    message: err.to_string(),
                })
            }
        }
    }

    async fn upload(
        &self,
        container: &Container,
        key: &str,
        local: &Path,
        headers: &BTreeMap<String, String>,
    ) -> Result<()> {
        let body = ByteStream::from_path(local).await.map_err(|e| Error::Upload {
            key: key.to_string(),
            message: format!("failed to open {}: {e}", local.display()),
        })?;

        let mut request = self
            .s3
            .put_object()
            .bucket(&container.name)
            .key(key)
            .body(body)
            .acl(ObjectCannedAcl::PublicRead);

        for (name, value) in headers {
            request = match name.to_ascii_lowercase().as_str() {
                "content-type" => request.content_type(value.clone()),
                "cache-control" => request.cache_control(value.clone()),
                "content-encoding" => request.content_encoding(value.clone()),
                "content-disposition" => request.content_disposition(value.clone()),
                _ => request.metadata(name.clone(), value.clone()),
            };
        }

        request.send().await.map_err(|e| Error::Upload {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        Ok(())
    }

    async fn purge_file_from_cdn(
        &self,
        container: &Container,
        key: &str,
        emails: &[String],
    ) -> Result<()> {
        let base = self.cdn_endpoint.as_ref().ok_or_else(|| Error::Purge {
            key: key.to_string(),
            message: "no CDN endpoint configured".to_string(),
        })?;

        let url = format!(
            "{}/objects/{}",
            self.cdn_container_url(base, &container.name),
            encode_key(key)
        );

        let mut request = self.http.delete(url);
        if !emails.is_empty() {
            request = request.header("X-Purge-Email", emails.join(","));
        }

        request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Purge {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }
}
