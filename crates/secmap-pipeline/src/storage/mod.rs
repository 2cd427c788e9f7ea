//! S3-compatible object storage client
//!
//! Wraps the AWS SDK for the handful of operations the pipeline needs:
//! upload a local file as a publicly readable object, list objects by
//! prefix, and compute public URLs. Built from an explicit
//! [`config::StorageConfig`], never from ambient credentials.

use anyhow::{Context, Result};
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    types::ObjectCannedAcl,
    Client,
};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::content_type::content_type_for;

pub mod config;

pub use config::StorageConfig;

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    endpoint: String,
    public_url_base: Option<String>,
}

impl Storage {
    pub fn new(config: StorageConfig) -> Result<Self> {
        debug!("Initializing storage client for bucket {}", config.bucket);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "secmap-storage",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .force_path_style(config.path_style)
            .build();

        let client = Client::from_conf(s3_config);

        info!("Storage client initialized for bucket: {}", config.bucket);

        Ok(Self {
            client,
            bucket: config.bucket,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            public_url_base: config.public_url_base,
        })
    }

    /// Upload a local file and mark it publicly readable.
    ///
    /// The object key defaults to the file name and the content type is
    /// resolved from the extension when not given explicitly.
    #[instrument(skip(self))]
    pub async fn upload_file(
        &self,
        local_path: &Path,
        key: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<UploadResult> {
        let key = match key {
            Some(k) => k.to_string(),
            None => local_path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .with_context(|| format!("No file name in path: {}", local_path.display()))?,
        };
        let content_type = content_type
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(local_path).to_string());

        let data = std::fs::read(local_path)
            .with_context(|| format!("Failed to read {}", local_path.display()))?;
        let checksum = calculate_sha256(&data);
        let size = data.len() as i64;

        debug!(
            "Uploading {} bytes to s3://{}/{} as {}",
            size, self.bucket, key, content_type
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(&content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .context("Failed to upload to S3")?;

        let url = self.public_url_for(&key);

        info!("Successfully uploaded to {}", url);

        Ok(UploadResult {
            key,
            url,
            checksum,
            size,
        })
    }

    /// Compute the public URL for an object key.
    ///
    /// Uses the configured public base when present, otherwise falls back
    /// to path-style `endpoint/bucket/key`. Pure, no I/O.
    pub fn public_url_for(&self, key: &str) -> String {
        match &self.public_url_base {
            Some(base) => format!("{}/{}", base, key),
            None => format!("{}/{}/{}", self.endpoint, self.bucket, key),
        }
    }

    /// List bucket objects, optionally restricted to a key prefix.
    ///
    /// An empty bucket or a prefix with no matches yields an empty vec,
    /// not an error.
    #[instrument(skip(self))]
    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectEntry>> {
        debug!(
            "Listing objects in s3://{} (prefix: {:?})",
            self.bucket, prefix
        );

        let mut request = self.client.list_objects_v2().bucket(&self.bucket);

        if let Some(prefix) = prefix {
            request = request.prefix(prefix);
        }

        let response = request.send().await.context("Failed to list S3 objects")?;

        let entries = response
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                Some(ObjectEntry {
                    key,
                    size: obj.size().unwrap_or(0),
                    last_modified: obj
                        .last_modified()
                        .and_then(|dt| chrono::DateTime::parse_from_rfc3339(&dt.to_string()).ok())
                        .map(|dt| dt.with_timezone(&chrono::Utc)),
                })
            })
            .collect();

        Ok(entries)
    }
}

/// Outcome of a single upload
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub key: String,
    pub url: String,
    pub checksum: String,
    pub size: i64,
}

/// One entry from a bucket listing
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

fn calculate_sha256(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage(public_url_base: Option<&str>) -> Storage {
        Storage {
            client: Client::from_conf(aws_sdk_s3::Config::builder().build()),
            bucket: "tourism-data".to_string(),
            endpoint: "https://account.r2.cloudflarestorage.com".to_string(),
            public_url_base: public_url_base.map(str::to_string),
        }
    }

    #[test]
    fn test_public_url_with_base() {
        let storage = test_storage(Some("https://cdn.example.com"));
        assert_eq!(
            storage.public_url_for("secciones_latest.geojson"),
            "https://cdn.example.com/secciones_latest.geojson"
        );
    }

    #[test]
    fn test_public_url_falls_back_to_endpoint() {
        let storage = test_storage(None);
        assert_eq!(
            storage.public_url_for("secciones_latest.geojson"),
            "https://account.r2.cloudflarestorage.com/tourism-data/secciones_latest.geojson"
        );
    }

    #[test]
    fn test_calculate_sha256() {
        let checksum = calculate_sha256(b"Hello, World!");
        assert_eq!(
            checksum,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }
}
