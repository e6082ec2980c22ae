#![allow(dead_code)]

use pickperfect::analysis::{
    AnalysisMode, AnalysisResult, AnalysisService, AnalysisServiceError, AnalysisStatistics,
    GroupType, JobStatus, QualityMetrics, RawGroup, RawImage,
};
use pickperfect::cloud_storage::{
    object_key, owner_prefix, session_prefix, DurableStorage, ObjectUpload, StorageError,
    StoredObject,
};
use pickperfect::config::{Config, PollingConfig, SessionLimits};
use pickperfect::export::ZipArchivePacker;
use pickperfect::sources::{DriveApi, DriveError, DriveFile, LocalFile};
use pickperfect::{SessionManager, SessionServices};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OWNER: &str = "owner-1";

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Mock durable storage
///
/// Keeps objects in memory and records every delete so tests can assert
/// what cleanup was attempted.
#[derive(Default)]
pub struct MockStorage {
    objects: Mutex<BTreeMap<String, (String, Vec<u8>)>>,
    uploads: AtomicUsize,
    failing_names: Mutex<HashSet<String>>,
    fail_deletes: AtomicBool,
    upload_delay: Mutex<Option<Duration>>,
    delete_delay: Mutex<Option<Duration>>,
    pub delete_calls: Mutex<Vec<(String, String)>>,
    pub delete_all_calls: Mutex<Vec<String>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make uploads of this original file name fail until cleared
    pub fn fail_uploads_of(&self, name: &str) {
        self.failing_names.lock().unwrap().insert(name.to_string());
    }

    pub fn clear_upload_failures(&self) {
        self.failing_names.lock().unwrap().clear();
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_delete_delay(&self, delay: Duration) {
        *self.delete_delay.lock().unwrap() = Some(delay);
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Original names of stored objects, sorted
    pub fn stored_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .values()
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Paths stored for one session, in key order
    pub fn paths_for_session(&self, owner_id: &str, session_id: &str) -> Vec<String> {
        let prefix = session_prefix(owner_id, session_id);
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect()
    }

    /// Store an object directly, bypassing the session
    pub fn insert(&self, path: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (path.to_string(), bytes.to_vec()));
    }

    fn remove_prefix(&self, prefix: &str) {
        self.objects
            .lock()
            .unwrap()
            .retain(|key, _| !key.starts_with(prefix));
    }
}

#[async_trait::async_trait]
impl DurableStorage for MockStorage {
    async fn upload(
        &self,
        owner_id: &str,
        session_id: &str,
        object: ObjectUpload<'_>,
    ) -> Result<String, StorageError> {
        let delay = *self.upload_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self
            .failing_names
            .lock()
            .unwrap()
            .contains(object.original_name)
        {
            return Err(StorageError::SdkError(format!(
                "simulated failure for {}",
                object.original_name
            )));
        }

        let path = object_key(owner_id, session_id, object.extension);
        self.objects.lock().unwrap().insert(
            path.clone(),
            (object.original_name.to_string(), object.data.to_vec()),
        );
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(path)
    }

    async fn list_by_prefix(&self, owner_id: &str) -> Result<Vec<StoredObject>, StorageError> {
        let prefix = owner_prefix(owner_id);
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, (_, bytes))| StoredObject {
                path: key.clone(),
                name: key[prefix.len()..].to_string(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://storage.test/photos/{}", path)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StorageError::Download(format!("Object not found: {}", path)))
    }

    async fn delete_by_prefix(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<bool, StorageError> {
        self.delete_calls
            .lock()
            .unwrap()
            .push((owner_id.to_string(), session_id.to_string()));

        let delay = *self.delete_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::SdkError("simulated delete failure".to_string()));
        }
        self.remove_prefix(&session_prefix(owner_id, session_id));
        Ok(true)
    }

    async fn delete_all(&self, owner_id: &str) -> Result<bool, StorageError> {
        self.delete_all_calls
            .lock()
            .unwrap()
            .push(owner_id.to_string());

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::SdkError("simulated delete failure".to_string()));
        }
        self.remove_prefix(&owner_prefix(owner_id));
        Ok(true)
    }
}

type ResultBuilder = Box<dyn Fn(&str) -> AnalysisResult + Send + Sync>;

/// Mock analysis service
///
/// Status queries pop scripted statuses, then repeat the fallback.
pub struct MockAnalysisService {
    statuses: Mutex<VecDeque<JobStatus>>,
    fallback: Mutex<JobStatus>,
    status_delay: Mutex<Option<Duration>>,
    submit_delay: Mutex<Option<Duration>>,
    fail_status: AtomicBool,
    results: Mutex<Option<ResultBuilder>>,
    pub submits: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub submitted_modes: Mutex<Vec<AnalysisMode>>,
}

impl Default for MockAnalysisService {
    fn default() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(JobStatus::Completed),
            status_delay: Mutex::new(None),
            submit_delay: Mutex::new(None),
            fail_status: AtomicBool::new(false),
            results: Mutex::new(None),
            submits: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            submitted_modes: Mutex::new(Vec::new()),
        }
    }
}

impl MockAnalysisService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, statuses: Vec<JobStatus>) {
        *self.statuses.lock().unwrap() = statuses.into();
    }

    pub fn set_fallback(&self, status: JobStatus) {
        *self.fallback.lock().unwrap() = status;
    }

    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_status_queries(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    pub fn set_results<F>(&self, build: F)
    where
        F: Fn(&str) -> AnalysisResult + Send + Sync + 'static,
    {
        *self.results.lock().unwrap() = Some(Box::new(build));
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AnalysisService for MockAnalysisService {
    async fn submit(
        &self,
        session_id: &str,
        _owner_id: &str,
        mode: AnalysisMode,
    ) -> Result<String, AnalysisServiceError> {
        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submitted_modes.lock().unwrap().push(mode);
        Ok(session_id.to_string())
    }

    async fn status(&self, _session_id: &str) -> Result<JobStatus, AnalysisServiceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_status.load(Ordering::SeqCst) {
            return Err(AnalysisServiceError::Http {
                status: 503,
                message: "unavailable".to_string(),
            });
        }

        let scripted = self.statuses.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| self.fallback.lock().unwrap().clone()))
    }

    async fn results(&self, session_id: &str) -> Result<AnalysisResult, AnalysisServiceError> {
        let results = self.results.lock().unwrap();
        Ok(match results.as_ref() {
            Some(build) => build(session_id),
            None => AnalysisResult {
                session_id: session_id.to_string(),
                groups: Vec::new(),
                statistics: AnalysisStatistics::default(),
            },
        })
    }
}

/// Mock drive API serving files from memory
#[derive(Default)]
pub struct MockDriveApi {
    files: Mutex<HashMap<String, (DriveFile, Vec<u8>)>>,
    pub metadata_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

impl MockDriveApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, id: &str, name: &str, mime_type: &str, bytes: Vec<u8>) {
        let file = DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
        };
        self.files
            .lock()
            .unwrap()
            .insert(id.to_string(), (file, bytes));
    }

    pub fn metadata_count(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DriveApi for MockDriveApi {
    async fn file_metadata(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .map(|(file, _)| file.clone())
            .ok_or_else(|| DriveError::NotFound(file_id.to_string()))
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| DriveError::NotFound(file_id.to_string()))
    }
}

/// Collaborators for one test manager
pub struct TestServices {
    pub storage: Arc<MockStorage>,
    pub analysis: Arc<MockAnalysisService>,
    pub drive: Arc<MockDriveApi>,
}

impl TestServices {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(MockStorage::new()),
            analysis: Arc::new(MockAnalysisService::new()),
            drive: Arc::new(MockDriveApi::new()),
        }
    }

    pub fn manager(&self, config: Config) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            OWNER,
            config,
            SessionServices {
                storage: self.storage.clone(),
                analysis: self.analysis.clone(),
                drive: Some(self.drive.clone() as Arc<dyn DriveApi>),
                packer: Arc::new(ZipArchivePacker),
            },
            tokio::runtime::Handle::current(),
        ))
    }

    /// Results group every stored photo of the session into one duplicate group
    pub fn group_stored_photos(&self) {
        let storage = self.storage.clone();
        self.analysis.set_results(move |session_id| {
            let paths = storage.paths_for_session(OWNER, session_id);
            analysis_result(
                session_id,
                vec![raw_group("all", GroupType::Duplicate, &paths, 0.97)],
            )
        });
    }
}

/// Config with short polling so tests stay fast
pub fn test_config() -> Config {
    Config {
        limits: SessionLimits::default(),
        polling: PollingConfig {
            interval: Duration::from_millis(10),
            max_attempts: 5,
            not_found_backoff_factor: 2,
            submit_settle: Duration::from_millis(1),
        },
        ..Config::default()
    }
}

/// A small fake JPEG; `seed` makes the bytes, and so the local id, unique
pub fn jpeg(name: &str, seed: u8) -> LocalFile {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend(std::iter::repeat(seed).take(64));
    LocalFile::new(name, bytes)
}

pub fn raw_image(path: &str, score: f64) -> RawImage {
    RawImage {
        path: path.to_string(),
        quality: QualityMetrics {
            overall_score: score,
            ..Default::default()
        },
        file_size: 68,
    }
}

/// Group over `paths`; the last path scores highest
pub fn raw_group(id: &str, group_type: GroupType, paths: &[String], score: f64) -> RawGroup {
    let images: Vec<RawImage> = paths
        .iter()
        .enumerate()
        .map(|(i, path)| raw_image(path, 0.5 + i as f64 * 0.1))
        .collect();
    RawGroup {
        id: id.to_string(),
        group_type,
        count: images.len(),
        best_image: images.last().cloned(),
        images,
        similarity_score: score,
    }
}

pub fn analysis_result(session_id: &str, groups: Vec<RawGroup>) -> AnalysisResult {
    let total_images = groups.iter().map(|g| g.images.len()).sum();
    AnalysisResult {
        session_id: session_id.to_string(),
        statistics: AnalysisStatistics {
            total_images,
            total_groups: groups.len(),
            ..Default::default()
        },
        groups,
    }
}
