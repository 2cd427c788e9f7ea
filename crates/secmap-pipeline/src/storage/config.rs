use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Explicit object-storage configuration.
///
/// Always passed to [`crate::storage::Storage::new`] as a value rather than
/// read ambiently, so several configurations can coexist in tests. Missing
/// endpoint or credentials make `from_env` fail, which callers treat as
/// "publishing not configured".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
    /// Public base URL (e.g. a CDN domain) used instead of
    /// `endpoint/bucket` when computing object URLs
    pub public_url_base: Option<String>,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        let endpoint = require_var("S3_ENDPOINT")?;
        let access_key = env::var("S3_ACCESS_KEY")
            .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
            .map_err(|_| anyhow::anyhow!("S3_ACCESS_KEY (or AWS_ACCESS_KEY_ID) is not set"))?;
        let secret_key = env::var("S3_SECRET_KEY")
            .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
            .map_err(|_| anyhow::anyhow!("S3_SECRET_KEY (or AWS_SECRET_ACCESS_KEY) is not set"))?;

        Ok(Self {
            endpoint,
            // R2 and most S3-compatible stores accept "auto"
            region: env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
            bucket: require_var("S3_BUCKET")?,
            access_key,
            secret_key,
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            public_url_base: env::var("S3_PUBLIC_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
        })
    }
}

fn require_var(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("{} is not set", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment manipulation is process-global, so all from_env cases run
    // in a single test to avoid races with parallel test threads.
    #[test]
    fn test_from_env() {
        let vars = [
            "S3_ENDPOINT",
            "S3_ACCESS_KEY",
            "S3_SECRET_KEY",
            "S3_BUCKET",
            "S3_REGION",
            "S3_PATH_STYLE",
            "S3_PUBLIC_URL",
            "AWS_ACCESS_KEY_ID",
            "AWS_SECRET_ACCESS_KEY",
        ];
        for var in vars {
            env::remove_var(var);
        }

        // No credentials: configuration fails, nothing gets built
        assert!(StorageConfig::from_env().is_err());

        env::set_var("S3_ENDPOINT", "https://account.r2.cloudflarestorage.com");
        env::set_var("S3_ACCESS_KEY", "key");
        assert!(StorageConfig::from_env().is_err(), "secret still missing");

        env::set_var("S3_SECRET_KEY", "secret");
        env::set_var("S3_BUCKET", "tourism-data");
        env::set_var("S3_PUBLIC_URL", "https://cdn.example.com/");

        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.endpoint, "https://account.r2.cloudflarestorage.com");
        assert_eq!(config.bucket, "tourism-data");
        assert_eq!(config.region, "auto");
        assert!(config.path_style);
        // Trailing slash is stripped so URL joins stay single-slashed
        assert_eq!(
            config.public_url_base.as_deref(),
            Some("https://cdn.example.com")
        );

        for var in vars {
            env::remove_var(var);
        }
    }
}
