//! Publish the merged GeoJSON to object storage
//!
//! Every publish uploads twice: once under an immutable timestamped key
//! and once under a fixed "latest" key that is always overwritten. The
//! pointer file is only written after the latest upload succeeds, so a
//! half-finished publish never moves the pointer. Publishing is optional:
//! callers log any error here and complete in local-only mode.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use secmap_common::types::PublishPointer;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::storage::Storage;

/// Keys and pointer destinations for a publish
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Prefix for the timestamped object key
    pub prefix: String,

    /// Fixed key that always points at the most recent publish
    pub latest_key: String,

    /// Pointer file destinations (pipeline bookkeeping and the webapp
    /// public directory)
    pub pointer_paths: Vec<PathBuf>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            prefix: "secciones_with_shapes".to_string(),
            latest_key: "secciones_latest.geojson".to_string(),
            pointer_paths: vec![
                PathBuf::from("data/output/data-config.json"),
                PathBuf::from("webapp/public/data-config.json"),
            ],
        }
    }
}

/// Immutable object key for a publish at the given instant.
pub fn versioned_key(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.geojson", prefix, at.format("%Y%m%d%H%M%S"))
}

/// Upload the GeoJSON under a timestamped key and the latest key, then
/// record the pointer.
///
/// Returns the pointer that was written. Any upload or pointer-write
/// failure surfaces as `Err`; by then either nothing is visible or the
/// uploads are consistent, since the pointer is written last.
pub async fn publish_latest(
    storage: &Storage,
    geojson: &Path,
    options: &PublishOptions,
    at: DateTime<Utc>,
) -> Result<PublishPointer> {
    let versioned = storage
        .upload_file(geojson, Some(&versioned_key(&options.prefix, at)), None)
        .await
        .context("Versioned upload failed")?;

    let latest = storage
        .upload_file(geojson, Some(&options.latest_key), None)
        .await
        .context("Latest upload failed")?;

    info!(
        "Published {} ({} bytes, sha256 {}) as {} and {}",
        geojson.display(),
        latest.size,
        latest.checksum,
        versioned.key,
        latest.key
    );

    let pointer = PublishPointer {
        data_url: latest.url,
        last_updated: at,
        versioned_url: versioned.url,
    };
    write_pointer(&pointer, &options.pointer_paths)?;

    Ok(pointer)
}

/// Write the pointer JSON to every configured destination.
pub fn write_pointer(pointer: &PublishPointer, paths: &[PathBuf]) -> Result<()> {
    let json = serde_json::to_string_pretty(pointer)?;
    for path in paths {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, &json)
            .with_context(|| format!("Failed to write pointer to {}", path.display()))?;
        info!("Wrote publish pointer to {}", path.display());
    }
    Ok(())
}
