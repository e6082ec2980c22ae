use super::{Candidate, FetchedPhoto, Rejection, ValidationError};
use crate::models::{drive_photo_id, SourceKind};
use reqwest::{Client, Error as ReqwestError};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),
    #[error("Drive access token is missing or expired")]
    Unauthorized,
    #[error("Drive file not found: {0}")]
    NotFound(String),
    #[error("Drive API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Metadata for one file chosen in the drive picker
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Drive reports sizes as decimal strings
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: u64,
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Text(String),
        Number(u64),
    }

    match Option::<Size>::deserialize(deserializer)? {
        Some(Size::Number(n)) => Ok(n),
        Some(Size::Text(s)) => s.parse().map_err(serde::de::Error::custom),
        None => Ok(0),
    }
}

/// Trait for cloud drive access (allows mocking for tests)
#[async_trait::async_trait]
pub trait DriveApi: Send + Sync {
    async fn file_metadata(&self, file_id: &str) -> Result<DriveFile, DriveError>;
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError>;
}

/// Google Drive v3 REST client
#[derive(Clone)]
pub struct HttpDriveApi {
    client: Client,
    access_token: String,
    base_url: String,
}

impl HttpDriveApi {
    pub fn new(access_token: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: "https://www.googleapis.com/drive/v3".to_string(),
        }
    }

    async fn get(&self, file_id: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, DriveError> {
        let url = format!("{}/files/{}", self.base_url, urlencoding::encode(file_id));

        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status == 401 || status == 403 {
            Err(DriveError::Unauthorized)
        } else if status == 404 {
            Err(DriveError::NotFound(file_id.to_string()))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(DriveError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait::async_trait]
impl DriveApi for HttpDriveApi {
    async fn file_metadata(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        let response = self
            .get(file_id, &[("fields", "id,name,mimeType,size")])
            .await?;
        Ok(response.json().await?)
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        let response = self.get(file_id, &[("alt", "media")]).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Normalizes drive picker selections into session photos
#[derive(Clone)]
pub struct DriveAdapter {
    api: Arc<dyn DriveApi>,
}

impl DriveAdapter {
    pub fn new(api: Arc<dyn DriveApi>) -> Self {
        Self { api }
    }

    /// Look up metadata for each picked file. Files that cannot be described
    /// are reported as rejections.
    pub async fn describe(&self, file_ids: &[String]) -> (Vec<Candidate>, Vec<Rejection>) {
        let mut candidates = Vec::with_capacity(file_ids.len());
        let mut rejected = Vec::new();

        for file_id in file_ids {
            match self.api.file_metadata(file_id).await {
                Ok(file) => candidates.push(Candidate {
                    id: drive_photo_id(&file.id),
                    display_name: file.name,
                    mime_type: file.mime_type,
                    size_bytes: file.size,
                }),
                Err(e) => {
                    warn!("Failed to read drive metadata for {}: {}", file_id, e);
                    rejected.push(Rejection {
                        id: drive_photo_id(file_id),
                        error: ValidationError::Unreadable {
                            name: file_id.clone(),
                            reason: e.to_string(),
                        },
                    });
                }
            }
        }

        (candidates, rejected)
    }

    /// Download the bytes for candidates that passed screening
    pub async fn fetch(&self, candidates: Vec<Candidate>) -> (Vec<FetchedPhoto>, Vec<Rejection>) {
        let mut fetched = Vec::with_capacity(candidates.len());
        let mut rejected = Vec::new();

        for mut candidate in candidates {
            let file_id = candidate
                .id
                .strip_prefix("drive:")
                .unwrap_or(&candidate.id)
                .to_string();

            match self.api.download(&file_id).await {
                Ok(bytes) => {
                    debug!(
                        "Downloaded drive file {} ({} bytes)",
                        candidate.display_name,
                        bytes.len()
                    );
                    // Trust the downloaded length over the reported size
                    candidate.size_bytes = bytes.len() as u64;
                    fetched.push(FetchedPhoto {
                        candidate,
                        source: SourceKind::Drive,
                        bytes: Arc::from(bytes),
                    });
                }
                Err(e) => {
                    warn!("Failed to download drive file {}: {}", file_id, e);
                    rejected.push(Rejection {
                        id: candidate.id.clone(),
                        error: ValidationError::Unreadable {
                            name: candidate.display_name,
                            reason: e.to_string(),
                        },
                    });
                }
            }
        }

        (fetched, rejected)
    }
}
