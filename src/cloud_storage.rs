use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::{primitives::ByteStreamError, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("S3 SDK error: {0}")]
    SdkError(String),
    #[error("ByteStream error: {0}")]
    ByteStream(#[from] ByteStreamError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Download error: {0}")]
    Download(String),
}

/// S3 configuration for durable photo storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>, // For MinIO/S3-compatible services
}

impl S3Config {
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.bucket_name.trim().is_empty() {
            return Err(StorageError::Config(
                "Bucket name cannot be empty".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(StorageError::Config("Region cannot be empty".to_string()));
        }
        if self.access_key_id.trim().is_empty() {
            return Err(StorageError::Config(
                "Access key ID cannot be empty".to_string(),
            ));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(StorageError::Config(
                "Secret access key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One photo to persist
#[derive(Debug, Clone, Copy)]
pub struct ObjectUpload<'a> {
    pub original_name: &'a str,
    pub extension: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

/// An object found under an owner's prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Full key, `<owner>/<name>`
    pub path: String,
    /// Name relative to the owner prefix
    pub name: String,
    pub size: u64,
}

/// Key for a new object: `<owner>/<session>_<uuid>.<ext>`
pub fn object_key(owner_id: &str, session_id: &str, extension: &str) -> String {
    format!("{}/{}_{}.{}", owner_id, session_id, Uuid::new_v4(), extension)
}

/// Every object persisted for one session starts with this
pub fn session_prefix(owner_id: &str, session_id: &str) -> String {
    format!("{}/{}_", owner_id, session_id)
}

pub fn owner_prefix(owner_id: &str) -> String {
    format!("{}/", owner_id)
}

/// Trait for durable storage operations (allows mocking for tests)
#[async_trait::async_trait]
pub trait DurableStorage: Send + Sync {
    /// Persist one photo under the session prefix, returning its path
    async fn upload(
        &self,
        owner_id: &str,
        session_id: &str,
        object: ObjectUpload<'_>,
    ) -> Result<String, StorageError>;

    async fn list_by_prefix(&self, owner_id: &str) -> Result<Vec<StoredObject>, StorageError>;

    fn public_url(&self, path: &str) -> String;

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove every object of one session. Returns false if the store refused.
    async fn delete_by_prefix(&self, owner_id: &str, session_id: &str)
        -> Result<bool, StorageError>;

    /// Remove every object of one owner
    async fn delete_all(&self, owner_id: &str) -> Result<bool, StorageError>;
}

/// Production S3 storage implementation
pub struct S3Storage {
    client: Client,
    bucket_name: String,
    public_base: String,
}

impl S3Storage {
    /// Create a new S3 storage client
    pub async fn new(config: S3Config, public_url_base: Option<String>) -> Result<Self, StorageError> {
        config.validate()?;

        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None, // session_token
            None, // expiration
            "pickperfect-s3-config",
        );

        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        // Set custom endpoint if provided (for S3-compatible services)
        if let Some(endpoint) = &config.endpoint_url {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint.clone());
        }

        let aws_config = aws_config_builder.load().await;
        let client = Client::new(&aws_config);

        let public_base = match (public_url_base, config.endpoint_url) {
            (Some(base), _) => format!("{}/{}", base.trim_end_matches('/'), config.bucket_name),
            (None, Some(endpoint)) => {
                format!("{}/{}", endpoint.trim_end_matches('/'), config.bucket_name)
            }
            (None, None) => format!(
                "https://{}.s3.{}.amazonaws.com",
                config.bucket_name, config.region
            ),
        };

        Ok(S3Storage {
            client,
            bucket_name: config.bucket_name,
            public_base,
        })
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::SdkError(format!("List objects failed: {}", e)))?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    objects.push(StoredObject {
                        path: key.to_string(),
                        name: key.strip_prefix(prefix).unwrap_or(key).to_string(),
                        size: object.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn delete_keys(&self, keys: Vec<String>) -> Result<bool, StorageError> {
        // DeleteObjects accepts at most 1000 keys per request
        for batch in keys.chunks(1000) {
            let identifiers = batch
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::SdkError(format!("Invalid object key: {}", e)))?;

            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|e| StorageError::SdkError(format!("Invalid delete request: {}", e)))?;

            let response = self
                .client
                .delete_objects()
                .bucket(&self.bucket_name)
                .delete(delete)
                .send()
                .await
                .map_err(|e| StorageError::SdkError(format!("Delete objects failed: {}", e)))?;

            if !response.errors().is_empty() {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[async_trait::async_trait]
impl DurableStorage for S3Storage {
    async fn upload(
        &self,
        owner_id: &str,
        session_id: &str,
        object: ObjectUpload<'_>,
    ) -> Result<String, StorageError> {
        let key = object_key(owner_id, session_id, object.extension);

        debug!("Uploading {} to {} ({} bytes)", object.original_name, key, object.data.len());

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(object.data.to_vec().into())
            .content_type(object.content_type)
            .cache_control("max-age=3600")
            .metadata("owner_id", owner_id)
            .metadata("session_id", session_id)
            .metadata("original_name", object.original_name)
            .send()
            .await
            .map_err(|e| StorageError::SdkError(format!("Put object failed: {}", e)))?;

        Ok(key)
    }

    async fn list_by_prefix(&self, owner_id: &str) -> Result<Vec<StoredObject>, StorageError> {
        self.list_keys(&owner_prefix(owner_id)).await
    }

    fn public_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.public_base, encoded.join("/"))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(path)
            .send()
            .await
            .map_err(|e| StorageError::Download(format!("Get object {} failed: {}", path, e)))?;

        let data = response.body.collect().await?.into_bytes().to_vec();
        debug!("Downloaded {} ({} bytes)", path, data.len());
        Ok(data)
    }

    async fn delete_by_prefix(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<bool, StorageError> {
        let prefix = session_prefix(owner_id, session_id);
        let keys: Vec<String> = self
            .list_keys(&prefix)
            .await?
            .into_iter()
            .map(|o| o.path)
            .collect();

        if keys.is_empty() {
            return Ok(true);
        }

        info!("Deleting {} objects under {}", keys.len(), prefix);
        self.delete_keys(keys).await
    }

    async fn delete_all(&self, owner_id: &str) -> Result<bool, StorageError> {
        let keys: Vec<String> = self
            .list_by_prefix(owner_id)
            .await?
            .into_iter()
            .map(|o| o.path)
            .collect();

        if keys.is_empty() {
            return Ok(true);
        }

        info!("Deleting all {} objects for owner {}", keys.len(), owner_id);
        self.delete_keys(keys).await
    }
}
