use super::{Candidate, FetchedPhoto, Rejection, ValidationError};
use crate::models::{local_photo_id, mime_from_name, SourceKind};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A file picked on this device
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub name: String,
    /// MIME type reported by the picker, if any; otherwise inferred from `name`
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            bytes,
        }
    }

    /// Read a file from disk
    pub async fn read(path: &Path) -> Result<Self, ValidationError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ValidationError::Unreadable {
                name: path.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self::new(name, bytes))
    }
}

/// Normalizes device file selections into session photos
pub struct LocalUploadAdapter;

impl LocalUploadAdapter {
    /// Read every path, reporting unreadable files as rejections
    pub async fn read_paths(paths: &[impl AsRef<Path>]) -> (Vec<LocalFile>, Vec<Rejection>) {
        let mut files = Vec::with_capacity(paths.len());
        let mut rejected = Vec::new();

        for path in paths {
            let path = path.as_ref();
            match LocalFile::read(path).await {
                Ok(file) => files.push(file),
                Err(error) => rejected.push(Rejection {
                    id: path.display().to_string(),
                    error,
                }),
            }
        }

        (files, rejected)
    }

    /// Turn picked files into fetched photos. Files whose type cannot be
    /// determined keep an empty MIME type and are rejected during admission.
    pub fn prepare(files: Vec<LocalFile>) -> Vec<FetchedPhoto> {
        files
            .into_iter()
            .map(|file| {
                let mime_type = file
                    .mime_type
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .or_else(|| mime_from_name(&file.name).map(str::to_string))
                    .unwrap_or_default();

                let id = local_photo_id(&file.bytes);
                debug!("Prepared local file {} as {}", file.name, id);

                FetchedPhoto {
                    candidate: Candidate {
                        id,
                        display_name: file.name,
                        mime_type,
                        size_bytes: file.bytes.len() as u64,
                    },
                    source: SourceKind::Local,
                    bytes: Arc::from(file.bytes),
                }
            })
            .collect()
    }
}
