// # Upload Coordinator
//
// Persists the session photo set to durable storage exactly once.
//
// The `UploadLedger` remembers the durable session id and which photos already
// have a stored path. `begin` mints the id on first use and returns only the
// photos still missing, so a retry after a partial failure uploads just the
// failed subset under the same prefix. Once every photo is persisted the
// ledger is sealed and the photo set can no longer change.

use crate::cloud_storage::{DurableStorage, ObjectUpload};
use crate::session::SessionPhotoSet;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

/// Server-recognized handle binding a storage prefix to the uploaded set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DurableSessionId(String);

impl DurableSessionId {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DurableSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPhoto {
    pub photo_id: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPhoto {
    pub photo_id: String,
    pub display_name: String,
    pub reason: String,
}

/// Aggregate failure of a commit. Succeeded uploads stay persisted.
#[derive(Error, Debug, Clone)]
#[error("{} of {} photos failed to upload: {}", .failed.len(), .failed.len() + .succeeded.len(), failed_names(.failed))]
pub struct UploadFailure {
    pub session_id: DurableSessionId,
    pub succeeded: Vec<UploadedPhoto>,
    pub failed: Vec<FailedPhoto>,
}

fn failed_names(failed: &[FailedPhoto]) -> String {
    failed
        .iter()
        .map(|f| format!("{} ({})", f.display_name, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A photo that still needs to be persisted
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub photo_id: String,
    pub display_name: String,
    pub mime_type: String,
    pub extension: String,
    pub bytes: Arc<[u8]>,
}

/// Work for one commit attempt
#[derive(Debug, Clone)]
pub struct CommitPlan {
    pub session_id: DurableSessionId,
    pub pending: Vec<PendingUpload>,
    /// Photos persisted by earlier attempts
    pub already_persisted: usize,
}

/// Result of uploading a plan's pending photos
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    pub succeeded: Vec<UploadedPhoto>,
    pub failed: Vec<FailedPhoto>,
}

/// Per-session record of what has been persisted
#[derive(Debug, Default)]
pub struct UploadLedger {
    session_id: Option<DurableSessionId>,
    persisted: HashMap<String, String>,
    sealed: bool,
}

impl UploadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<&DurableSessionId> {
        self.session_id.as_ref()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn path_of(&self, photo_id: &str) -> Option<&str> {
        self.persisted.get(photo_id).map(String::as_str)
    }

    pub fn persisted_count(&self) -> usize {
        self.persisted.len()
    }

    /// Plan the next commit, minting the session id on first use
    pub fn begin(&mut self, set: &SessionPhotoSet) -> CommitPlan {
        let session_id = self
            .session_id
            .get_or_insert_with(DurableSessionId::mint)
            .clone();

        let pending: Vec<PendingUpload> = set
            .iter()
            .filter(|record| !self.persisted.contains_key(&record.id))
            .map(|record| PendingUpload {
                photo_id: record.id.clone(),
                display_name: record.display_name.clone(),
                mime_type: record.mime_type.clone(),
                extension: record.extension(),
                bytes: record.bytes.clone(),
            })
            .collect();

        CommitPlan {
            session_id,
            already_persisted: set.len() - pending.len(),
            pending,
        }
    }

    /// Fold an attempt's outcome into the ledger. Seals the ledger and returns
    /// the session id once nothing is left to upload.
    pub fn apply(
        &mut self,
        plan: &CommitPlan,
        outcome: CommitOutcome,
    ) -> Result<DurableSessionId, UploadFailure> {
        for uploaded in &outcome.succeeded {
            self.persisted
                .insert(uploaded.photo_id.clone(), uploaded.path.clone());
        }

        if outcome.failed.is_empty() {
            self.sealed = true;
            Ok(plan.session_id.clone())
        } else {
            Err(UploadFailure {
                session_id: plan.session_id.clone(),
                succeeded: outcome.succeeded,
                failed: outcome.failed,
            })
        }
    }

    /// Forget everything, including the session id
    pub fn clear(&mut self) {
        self.session_id = None;
        self.persisted.clear();
        self.sealed = false;
    }
}

/// Uploads pending photos with bounded concurrency
#[derive(Clone)]
pub struct UploadCoordinator {
    storage: Arc<dyn DurableStorage>,
    max_concurrent: usize,
}

impl UploadCoordinator {
    pub fn new(storage: Arc<dyn DurableStorage>, max_concurrent: usize) -> Self {
        Self {
            storage,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Commit the set: upload whatever the ledger has not yet persisted.
    ///
    /// Calling this again for a sealed ledger uploads nothing and returns the
    /// same session id.
    pub async fn commit(
        &self,
        ledger: &mut UploadLedger,
        set: &SessionPhotoSet,
        owner_id: &str,
    ) -> Result<DurableSessionId, UploadFailure> {
        let plan = ledger.begin(set);
        let outcome = self
            .upload(owner_id, &plan, |_uploaded, _completed, _total| {})
            .await;
        ledger.apply(&plan, outcome)
    }

    /// Upload a plan's pending photos. `on_uploaded` is called after each
    /// successful upload with (photo, completed, total).
    pub async fn upload<F>(&self, owner_id: &str, plan: &CommitPlan, mut on_uploaded: F) -> CommitOutcome
    where
        F: FnMut(&UploadedPhoto, usize, usize),
    {
        let total = plan.pending.len();
        if total == 0 {
            info!(
                "Session {} already persisted ({} photos), nothing to upload",
                plan.session_id, plan.already_persisted
            );
            return CommitOutcome::default();
        }

        info!(
            "Uploading {} photos for session {} ({} already persisted)",
            total, plan.session_id, plan.already_persisted
        );

        let storage = self.storage.clone();
        let session_id = plan.session_id.as_str();

        let uploads: Vec<_> = plan
            .pending
            .iter()
            .map(|pending| {
                let storage = storage.clone();
                async move {
                    let object = ObjectUpload {
                        original_name: &pending.display_name,
                        extension: &pending.extension,
                        content_type: &pending.mime_type,
                        data: &pending.bytes,
                    };
                    let result = storage.upload(owner_id, session_id, object).await;
                    (pending, result)
                }
            })
            .collect();
        let mut results = stream::iter(uploads).buffered(self.max_concurrent);

        let mut outcome = CommitOutcome::default();
        while let Some((pending, result)) = results.next().await {
            match result {
                Ok(path) => {
                    let uploaded = UploadedPhoto {
                        photo_id: pending.photo_id.clone(),
                        path,
                    };
                    on_uploaded(&uploaded, outcome.succeeded.len() + 1, total);
                    outcome.succeeded.push(uploaded);
                }
                Err(e) => {
                    error!("Failed to upload {}: {}", pending.display_name, e);
                    outcome.failed.push(FailedPhoto {
                        photo_id: pending.photo_id.clone(),
                        display_name: pending.display_name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Upload for session {} finished: {} succeeded, {} failed",
            plan.session_id,
            outcome.succeeded.len(),
            outcome.failed.len()
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud_storage::{object_key, StorageError, StoredObject};
    use crate::config::SessionLimits;
    use crate::preview_registry::PreviewRegistry;
    use crate::sources::{admit_into, LocalFile, LocalUploadAdapter};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Storage that fails uploads of the named files
    #[derive(Default)]
    struct FlakyStorage {
        failing: Mutex<HashSet<String>>,
        uploads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl DurableStorage for FlakyStorage {
        async fn upload(
            &self,
            owner_id: &str,
            session_id: &str,
            object: ObjectUpload<'_>,
        ) -> Result<String, StorageError> {
            if self.failing.lock().unwrap().contains(object.original_name) {
                return Err(StorageError::SdkError("refused".to_string()));
            }
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(object_key(owner_id, session_id, object.extension))
        }

        async fn list_by_prefix(&self, _owner_id: &str) -> Result<Vec<StoredObject>, StorageError> {
            Ok(Vec::new())
        }

        fn public_url(&self, path: &str) -> String {
            path.to_string()
        }

        async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::Download(path.to_string()))
        }

        async fn delete_by_prefix(&self, _owner_id: &str, _session_id: &str) -> Result<bool, StorageError> {
            Ok(true)
        }

        async fn delete_all(&self, _owner_id: &str) -> Result<bool, StorageError> {
            Ok(true)
        }
    }

    fn photo_set(names: &[&str]) -> SessionPhotoSet {
        let files = names
            .iter()
            .enumerate()
            .map(|(i, name)| LocalFile::new(*name, vec![0xFF, 0xD8, i as u8]))
            .collect();
        let mut set = SessionPhotoSet::new();
        let mut previews = PreviewRegistry::new();
        admit_into(
            &mut set,
            &mut previews,
            LocalUploadAdapter::prepare(files),
            &SessionLimits::default(),
        );
        set
    }

    #[test]
    fn test_begin_mints_session_id_once() {
        let set = photo_set(&["a.jpg", "b.png"]);
        let mut ledger = UploadLedger::new();

        let first = ledger.begin(&set);
        let second = ledger.begin(&set);

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(first.pending.len(), 2);
        assert_eq!(first.pending[1].extension, "png");
        assert!(!ledger.is_sealed());
    }

    #[test]
    fn test_apply_partial_keeps_succeeded_and_retries_rest() {
        let set = photo_set(&["a.jpg", "b.jpg"]);
        let mut ledger = UploadLedger::new();
        let plan = ledger.begin(&set);

        let outcome = CommitOutcome {
            succeeded: vec![UploadedPhoto {
                photo_id: plan.pending[0].photo_id.clone(),
                path: "owner/x_1.jpg".to_string(),
            }],
            failed: vec![FailedPhoto {
                photo_id: plan.pending[1].photo_id.clone(),
                display_name: "b.jpg".to_string(),
                reason: "timeout".to_string(),
            }],
        };
        let failure = ledger.apply(&plan, outcome).unwrap_err();
        assert_eq!(failure.to_string(), "1 of 2 photos failed to upload: b.jpg (timeout)");
        assert!(!ledger.is_sealed());
        assert_eq!(ledger.path_of(&plan.pending[0].photo_id), Some("owner/x_1.jpg"));

        let retry = ledger.begin(&set);
        assert_eq!(retry.session_id, plan.session_id);
        assert_eq!(retry.already_persisted, 1);
        assert_eq!(retry.pending.len(), 1);
        assert_eq!(retry.pending[0].display_name, "b.jpg");
    }

    #[test]
    fn test_clear_forgets_session() {
        let set = photo_set(&["a.jpg"]);
        let mut ledger = UploadLedger::new();
        let plan = ledger.begin(&set);
        ledger.apply(&plan, CommitOutcome::default()).unwrap();
        assert!(ledger.is_sealed());

        ledger.clear();
        assert!(ledger.session_id().is_none());
        assert!(!ledger.is_sealed());
        assert_eq!(ledger.persisted_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_retry_uploads_failed_subset_only() {
        let storage = Arc::new(FlakyStorage::default());
        storage.failing.lock().unwrap().insert("c.jpg".to_string());
        let coordinator = UploadCoordinator::new(storage.clone(), 2);
        let set = photo_set(&["a.jpg", "b.jpg", "c.jpg"]);
        let mut ledger = UploadLedger::new();

        let failure = coordinator
            .commit(&mut ledger, &set, "owner")
            .await
            .unwrap_err();
        assert_eq!(failure.succeeded.len(), 2);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 2);

        storage.failing.lock().unwrap().clear();
        let session_id = coordinator.commit(&mut ledger, &set, "owner").await.unwrap();
        assert_eq!(session_id, failure.session_id);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 3);
        assert_eq!(ledger.persisted_count(), 3);

        // sealed: nothing more to upload
        let again = coordinator.commit(&mut ledger, &set, "owner").await.unwrap();
        assert_eq!(again, session_id);
        assert_eq!(storage.uploads.load(Ordering::SeqCst), 3);
    }
}
