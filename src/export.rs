use crate::cloud_storage::DurableStorage;
use crate::error::SessionError;
use crate::grouping::GroupPhoto;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One named blob to put in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Bundles named blobs into a single archive
pub trait ArchivePacker: Send + Sync {
    fn pack(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError>;
}

/// Deflate-compressed zip archives
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchivePacker;

impl ArchivePacker for ZipArchivePacker {
    fn pack(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in entries {
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// Give repeated names a ` (n)` suffix before the extension
fn unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .map(|name| {
            let (stem, ext) = match name.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
                _ => (name, None),
            };

            let mut candidate = name.to_string();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                candidate = match ext {
                    Some(ext) => format!("{} ({}).{}", stem, n, ext),
                    None => format!("{} ({})", stem, n),
                };
                n += 1;
            }
            candidate
        })
        .collect()
}

/// Download the given photos and pack them into one archive.
///
/// Entries keep the order of `photos`. Any failed download fails the whole
/// export so the user never receives a silently incomplete archive.
pub async fn build_archive(
    storage: &Arc<dyn DurableStorage>,
    packer: &dyn ArchivePacker,
    photos: &[GroupPhoto],
    concurrency: usize,
) -> Result<Vec<u8>, SessionError> {
    if photos.is_empty() {
        return Err(SessionError::Export("Nothing selected to download".to_string()));
    }

    info!("Downloading {} photos for export", photos.len());

    let downloads: Vec<_> = stream::iter(photos.iter())
        .map(|photo| {
            let storage = storage.clone();
            async move { (photo, storage.download(&photo.path).await) }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let names = unique_names(photos.iter().map(|p| p.filename.as_str()));
    let mut entries = Vec::with_capacity(downloads.len());
    for ((photo, downloaded), name) in downloads.into_iter().zip(names) {
        match downloaded {
            Ok(bytes) => entries.push(ArchiveEntry { name, bytes }),
            Err(e) => {
                warn!("Failed to download {} for export: {}", photo.path, e);
                return Err(SessionError::Export(format!(
                    "Failed to download {}: {}",
                    photo.filename, e
                )));
            }
        }
    }

    let archive = packer
        .pack(&entries)
        .map_err(|e| SessionError::Export(e.to_string()))?;

    info!(
        "Packed {} photos into a {} byte archive",
        entries.len(),
        archive.len()
    );
    Ok(archive)
}
