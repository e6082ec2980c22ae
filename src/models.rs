use crate::preview_registry::PreviewHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Image MIME types accepted from any source
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// Image extensions recognised in file names and storage paths
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

/// Where a photo came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Drive,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Local => f.write_str("local"),
            SourceKind::Drive => f.write_str("drive"),
        }
    }
}

/// One photo queued for analysis, regardless of origin.
///
/// The raw bytes are held behind an `Arc` so the upload task can borrow them
/// without holding the session lock; the record stays the only owner visible
/// to the rest of the session.
#[derive(Debug, Clone)]
pub struct PhotoRecord {
    pub id: String,
    pub source: SourceKind,
    pub display_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub bytes: Arc<[u8]>,
    pub preview: Option<PreviewHandle>,
    pub added_at: DateTime<Utc>,
}

impl PhotoRecord {
    pub fn size_label(&self) -> String {
        format_size(self.size_bytes)
    }

    /// Lower-cased extension for the stored object name
    pub fn extension(&self) -> String {
        extension_from_name(&self.display_name)
            .or_else(|| extension_for_mime(&self.mime_type).map(str::to_string))
            .unwrap_or_else(|| "jpg".to_string())
    }
}

/// Stable id for a drive file
pub fn drive_photo_id(file_id: &str) -> String {
    format!("drive:{}", file_id)
}

/// Stable id for local bytes: identical content maps to the same record
pub fn local_photo_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("local:{}", hex::encode(digest))
}

/// Human readable size, base 1024, up to two decimals (`1.5 MB`, `0 Bytes`)
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

pub fn is_allowed_mime(mime_type: &str) -> bool {
    let lower = mime_type.trim().to_lowercase();
    ALLOWED_MIME_TYPES.contains(&lower.as_str())
}

/// Guess an image MIME type from a file name's extension
pub fn mime_from_name(name: &str) -> Option<&'static str> {
    match extension_from_name(name)?.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

fn extension_from_name(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type.trim().to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        _ => None,
    }
}
