//! Zip archive assembly for completed results.
//!
//! Builds one compressed container from a filtered set of completed
//! items. Entries are named by the SEO filename generator and laid out
//! as `<variant>/<filename>`; entry bytes are the untransformed original
//! asset bytes. A failed asset fetch skips that single entry and never
//! aborts the build. Per-entry marketplace metadata travels in the
//! archive comment as a JSON manifest keyed by entry path.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::naming::make_filename;
use crate::queue::{ItemStatus, QueueItem, Variant};
use crate::storage::AssetStore;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no completed items to archive")]
    NothingToArchive,

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// What the build actually included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub requested: usize,
    pub added: usize,
    pub skipped: usize,
}

/// Marketplace metadata embedded for one archive entry.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

impl From<&Variant> for EmbeddedMetadata {
    fn from(variant: &Variant) -> Self {
        Self {
            title: variant.title.clone(),
            description: variant.description.clone(),
            keywords: variant.keywords.clone(),
        }
    }
}

/// One planned archive entry: target path, source, embedded metadata.
struct ManifestEntry {
    path: String,
    asset_url: String,
    metadata: EmbeddedMetadata,
}

/// Build a zip from completed items, optionally restricted to one
/// variant per item. Returns the container bytes and a report of how
/// many of the `items × variants` entries made it in.
pub async fn build_archive(
    assets: &AssetStore,
    items: &[QueueItem],
    variant_filter: Option<&str>,
) -> Result<(Vec<u8>, ArchiveReport)> {
    let manifest = plan_entries(items, variant_filter);
    if manifest.is_empty() {
        return Err(ArchiveError::NothingToArchive);
    }

    let requested = manifest.len();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut embedded: BTreeMap<String, EmbeddedMetadata> = BTreeMap::new();

    for entry in manifest {
        // Per-entry failures are skipped, not fatal: a half-full archive
        // beats no archive when one source asset is gone.
        let bytes = match assets.fetch(&entry.asset_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %entry.path, error = %e, "Skipping archive entry, fetch failed");
                continue;
            }
        };

        writer.start_file(entry.path.as_str(), options.clone())?;
        writer.write_all(&bytes)?;
        embedded.insert(entry.path, entry.metadata);
    }

    let report = ArchiveReport {
        requested,
        added: embedded.len(),
        skipped: requested - embedded.len(),
    };

    writer.set_comment(serde_json::to_string(&embedded)?);

    info!(
        requested = report.requested,
        added = report.added,
        skipped = report.skipped,
        "Archive built"
    );

    let cursor = writer.finish()?;
    Ok((cursor.into_inner(), report))
}

/// Expand `items × variants` into the transient archive manifest,
/// keeping only completed items with an uploaded asset.
fn plan_entries(items: &[QueueItem], variant_filter: Option<&str>) -> Vec<ManifestEntry> {
    let mut manifest = Vec::new();

    for item in items {
        if item.status != ItemStatus::Completed {
            continue;
        }
        let (Some(result), Some(asset_url)) = (&item.result, &item.uploaded_asset_url) else {
            continue;
        };

        for variant in &result.variants {
            if variant_filter.is_some_and(|f| f != variant.target) {
                continue;
            }

            let filename = make_filename(
                variant.title.as_deref().unwrap_or(&item.file_name),
                &variant.keywords,
                &variant.target,
                item.extension(),
            );

            manifest.push(ManifestEntry {
                path: format!("{}/{}", variant.target, filename),
                asset_url: asset_url.clone(),
                metadata: EmbeddedMetadata::from(variant),
            });
        }
    }

    manifest
}
