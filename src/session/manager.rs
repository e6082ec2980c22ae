use super::state::{SessionStage, SessionState, TeardownReason, TeardownReport};
use crate::analysis::{
    AnalysisJob, AnalysisMode, AnalysisOrchestrator, AnalysisResult, AnalysisService, JobState,
    MIN_PHOTOS_FOR_ANALYSIS,
};
use crate::cloud_storage::DurableStorage;
use crate::config::Config;
use crate::error::SessionError;
use crate::export::{build_archive, ArchivePacker};
use crate::grouping::{rank, GroupPhoto, PhotoGroup, ReviewSummary};
use crate::models::{drive_photo_id, PhotoRecord};
use crate::preview_registry::PreviewHandle;
use crate::progress::{ProgressHandle, SessionProgress};
use crate::selection::Navigation;
use crate::sources::{
    admit_into, plan_admission, AdmissionReport, DriveAdapter, DriveApi, FetchedPhoto, LocalFile,
    LocalUploadAdapter, ValidationError,
};
use crate::upload::{DurableSessionId, UploadCoordinator};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// External collaborators a session needs
#[derive(Clone)]
pub struct SessionServices {
    pub storage: Arc<dyn DurableStorage>,
    pub analysis: Arc<dyn AnalysisService>,
    /// `None` when no drive account is connected
    pub drive: Option<Arc<dyn DriveApi>>,
    pub packer: Arc<dyn ArchivePacker>,
}

/// One selection event from a source
#[derive(Debug, Clone)]
pub enum PhotoSelection {
    /// Files picked on this device, bytes in hand
    Local(Vec<LocalFile>),
    /// Files on this device, read from disk
    Paths(Vec<PathBuf>),
    /// Drive file ids
    Drive(Vec<String>),
}

/// Owns the active session and every transition of its lifecycle.
///
/// All state lives behind one mutex that is never held across an await.
/// Async operations snapshot the session generation before suspending and
/// re-check it before applying their outcome; a teardown bumps the
/// generation, so anything resolving afterwards is discarded as stale.
pub struct SessionManager {
    owner_id: String,
    config: Config,
    storage: Arc<dyn DurableStorage>,
    uploader: UploadCoordinator,
    orchestrator: AnalysisOrchestrator,
    drive: Option<DriveAdapter>,
    packer: Arc<dyn ArchivePacker>,
    state: Mutex<SessionState>,
    /// Signalled whenever a teardown finishes
    teardown_done: Notify,
    progress_tx: mpsc::UnboundedSender<SessionProgress>,
    progress: ProgressHandle,
    runtime_handle: tokio::runtime::Handle,
}

impl SessionManager {
    pub fn new(
        owner_id: impl Into<String>,
        config: Config,
        services: SessionServices,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let progress = ProgressHandle::new(progress_rx, runtime_handle.clone());

        Self {
            owner_id: owner_id.into(),
            uploader: UploadCoordinator::new(services.storage.clone(), config.upload_concurrency),
            orchestrator: AnalysisOrchestrator::new(services.analysis, config.polling.clone()),
            drive: services.drive.map(DriveAdapter::new),
            storage: services.storage,
            packer: services.packer,
            config,
            state: Mutex::new(SessionState::new()),
            teardown_done: Notify::new(),
            progress_tx,
            progress,
            runtime_handle,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, progress: SessionProgress) {
        // No subscribers is fine
        let _ = self.progress_tx.send(progress);
    }

    /// Reject changes to the photo set while it cannot change
    fn ensure_mutable(state: &SessionState) -> Result<(), SessionError> {
        if state.tearing_down {
            return Err(SessionError::Busy("teardown"));
        }
        if state.ledger.is_sealed() {
            return Err(ValidationError::SessionSealed.into());
        }
        if state.commit_in_flight {
            return Err(SessionError::Busy("upload"));
        }
        Ok(())
    }

    fn ensure_current(state: &SessionState, generation: u64) -> Result<(), SessionError> {
        if state.generation != generation {
            debug!(
                "Discarding result for generation {} (current {})",
                generation, state.generation
            );
            return Err(SessionError::Stale);
        }
        Ok(())
    }

    // ========== Adding and removing photos ==========

    pub async fn add_photos(
        &self,
        selection: PhotoSelection,
    ) -> Result<AdmissionReport, SessionError> {
        match selection {
            PhotoSelection::Local(files) => self.add_local_files(files),
            PhotoSelection::Paths(paths) => self.add_local_paths(&paths).await,
            PhotoSelection::Drive(ids) => self.add_drive_files(&ids).await,
        }
    }

    /// Admit files picked on this device
    pub fn add_local_files(&self, files: Vec<LocalFile>) -> Result<AdmissionReport, SessionError> {
        Self::ensure_mutable(&self.lock())?;

        let fetched = LocalUploadAdapter::prepare(files);
        self.admit(fetched, None)
    }

    /// Read files from disk and admit them
    pub async fn add_local_paths(
        &self,
        paths: &[PathBuf],
    ) -> Result<AdmissionReport, SessionError> {
        let generation = {
            let state = self.lock();
            Self::ensure_mutable(&state)?;
            state.generation
        };

        let (files, unreadable) = LocalUploadAdapter::read_paths(paths).await;
        let fetched = LocalUploadAdapter::prepare(files);

        let mut report = self.admit(fetched, Some(generation))?;
        report.merge_rejections(unreadable);
        Ok(report)
    }

    /// Admit drive files. Ids already in the session are skipped without a
    /// request; the rest are screened on metadata before any bytes are
    /// downloaded.
    pub async fn add_drive_files(
        &self,
        file_ids: &[String],
    ) -> Result<AdmissionReport, SessionError> {
        let adapter = self.drive.as_ref().ok_or_else(|| {
            SessionError::InvalidState("No drive account is connected".to_string())
        })?;

        let mut report = AdmissionReport::default();
        let (generation, to_describe) = {
            let state = self.lock();
            Self::ensure_mutable(&state)?;

            let mut seen = HashSet::new();
            let mut to_describe = Vec::new();
            for file_id in file_ids {
                let id = drive_photo_id(file_id);
                if state.photos.contains(&id) || !seen.insert(id.clone()) {
                    report.merge_duplicates(vec![id]);
                } else {
                    to_describe.push(file_id.clone());
                }
            }
            (state.generation, to_describe)
        };

        if to_describe.is_empty() {
            info!("All {} drive files are already in the session", file_ids.len());
            return Ok(report);
        }

        let (candidates, undescribed) = adapter.describe(&to_describe).await;
        report.merge_rejections(undescribed);

        let screened = {
            let state = self.lock();
            Self::ensure_current(&state, generation)?;
            plan_admission(&candidates, &state.photos, &self.config.limits)
        };
        report.merge_rejections(screened.rejected);
        report.merge_duplicates(screened.duplicates);

        let accepted: Vec<_> = screened
            .accepted
            .into_iter()
            .map(|index| candidates[index].clone())
            .collect();
        let (fetched, failed) = adapter.fetch(accepted).await;
        report.merge_rejections(failed);

        let admitted = self.admit(fetched, Some(generation))?;
        report.admitted = admitted.admitted;
        report.merge_rejections(admitted.rejected);
        report.merge_duplicates(admitted.duplicates);
        Ok(report)
    }

    fn admit(
        &self,
        fetched: Vec<FetchedPhoto>,
        generation: Option<u64>,
    ) -> Result<AdmissionReport, SessionError> {
        let mut state = self.lock();
        if let Some(generation) = generation {
            Self::ensure_current(&state, generation)?;
        }
        Self::ensure_mutable(&state)?;

        let SessionState {
            photos, previews, ..
        } = &mut *state;
        Ok(admit_into(photos, previews, fetched, &self.config.limits))
    }

    /// Remove one photo and release its preview. Returns false for unknown ids.
    pub fn remove_photo(&self, photo_id: &str) -> Result<bool, SessionError> {
        let mut state = self.lock();
        Self::ensure_mutable(&state)?;

        let Some(record) = state.photos.remove(photo_id) else {
            return Ok(false);
        };
        if let Some(preview) = &record.preview {
            state.previews.revoke(preview);
        }
        info!("Removed {} from session", record.display_name);
        Ok(true)
    }

    // ========== Upload ==========

    /// Persist the photo set. Succeeds without uploading anything once the
    /// set is already persisted.
    pub async fn commit_upload(&self) -> Result<DurableSessionId, SessionError> {
        let (generation, cancel, plan) = {
            let mut state = self.lock();
            if state.tearing_down {
                return Err(SessionError::Busy("teardown"));
            }
            if state.commit_in_flight {
                return Err(SessionError::Busy("upload"));
            }
            if state.photos.is_empty() {
                return Err(ValidationError::EmptySelection.into());
            }
            if state.ledger.is_sealed() {
                if let Some(session_id) = state.ledger.session_id() {
                    debug!("Session {} already committed", session_id);
                    return Ok(session_id.clone());
                }
            }

            let state = &mut *state;
            state.commit_in_flight = true;
            state.upload_percent = 0;
            let plan = state.ledger.begin(&state.photos);
            (state.generation, state.cancel.clone(), plan)
        };

        let total = plan.pending.len();
        self.emit(SessionProgress::UploadStarted { generation, total });

        let upload = self
            .uploader
            .upload(&self.owner_id, &plan, |uploaded, completed, total| {
                let percent = ((completed * 100) / total.max(1)) as u8;
                {
                    let mut state = self.lock();
                    if state.generation == generation {
                        state.upload_percent = percent;
                    }
                }
                self.emit(SessionProgress::PhotoUploaded {
                    generation,
                    photo_id: uploaded.photo_id.clone(),
                    completed,
                    total,
                    percent,
                });
            });

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            outcome = upload => Some(outcome),
        };

        let applied = {
            let mut state = self.lock();
            match (Self::ensure_current(&state, generation), outcome) {
                (Ok(()), Some(outcome)) => {
                    state.commit_in_flight = false;
                    let applied = state.ledger.apply(&plan, outcome);
                    match &applied {
                        Ok(_) => {
                            state.stage = SessionStage::Preview;
                            state.upload_percent = 100;
                        }
                        Err(_) => state.stage = SessionStage::Upload,
                    }
                    Some(applied)
                }
                _ => None,
            }
        };

        match applied {
            Some(Ok(session_id)) => {
                info!("Committed session {}", session_id);
                self.emit(SessionProgress::UploadComplete {
                    generation,
                    session_id: session_id.to_string(),
                });
                Ok(session_id)
            }
            Some(Err(failure)) => {
                warn!("Commit of session {} failed: {}", failure.session_id, failure);
                self.emit(SessionProgress::UploadFailed {
                    generation,
                    failed: failure.failed.len(),
                });
                Err(failure.into())
            }
            None => {
                // The session was torn down mid-upload; anything that landed
                // after its prefix was deleted is an orphan.
                warn!(
                    "Session {} was torn down during upload, removing late objects",
                    plan.session_id
                );
                if let Err(e) = self
                    .storage
                    .delete_by_prefix(&self.owner_id, plan.session_id.as_str())
                    .await
                {
                    warn!("Failed to remove late objects for {}: {}", plan.session_id, e);
                }
                Err(SessionError::Stale)
            }
        }
    }

    // ========== Analysis ==========

    /// Choose the analysis mode. Locked once a job has been submitted.
    pub fn set_analysis_mode(&self, mode: AnalysisMode) -> Result<(), SessionError> {
        let mut state = self.lock();
        if state.analysis_in_flight {
            return Err(SessionError::Busy("analysis"));
        }
        if state.mode_locked && state.mode != mode {
            return Err(SessionError::InvalidState(format!(
                "Analysis mode is locked to {} for this session; start a new session to change it",
                state.mode
            )));
        }
        state.mode = mode;
        Ok(())
    }

    /// Submit the committed session for analysis and wait for the ranked
    /// groups. On failure the session returns to the stage it was in.
    pub async fn start_analysis(&self) -> Result<Vec<PhotoGroup>, SessionError> {
        let (generation, cancel, session_id, mode, photo_count, prior_stage) = {
            let mut state = self.lock();
            if state.tearing_down {
                return Err(SessionError::Busy("teardown"));
            }

            let photo_count = state.photos.len();
            if photo_count < MIN_PHOTOS_FOR_ANALYSIS {
                return Err(SessionError::InsufficientInput { found: photo_count });
            }
            if state.analysis_in_flight {
                return Err(SessionError::Busy("analysis"));
            }

            let session_id = match state.ledger.session_id() {
                Some(id) if state.ledger.is_sealed() => id.clone(),
                _ => {
                    return Err(SessionError::InvalidState(
                        "Upload the photos before starting analysis".to_string(),
                    ))
                }
            };

            let prior_stage = state.stage;
            state.analysis_in_flight = true;
            state.analysis_percent = 0;
            (
                state.generation,
                state.cancel.clone(),
                session_id,
                state.mode,
                photo_count,
                prior_stage,
            )
        };

        let submitted = tokio::select! {
            _ = cancel.cancelled() => Err(SessionError::Stale),
            submitted = self.orchestrator.submit(&session_id, &self.owner_id, mode, photo_count) => submitted,
        };

        let mut job = match submitted {
            Ok(job) => job,
            Err(e) => return self.fail_analysis(generation, prior_stage, e),
        };

        {
            let mut state = self.lock();
            Self::ensure_current(&state, generation)?;
            state.mode_locked = true;
            state.job = Some(job.clone());
            state.stage = SessionStage::Processing;
        }
        info!("Session {} moved to processing", session_id);
        self.emit(SessionProgress::AnalysisSubmitted {
            generation,
            session_id: session_id.to_string(),
            mode,
        });

        let completed = self
            .orchestrator
            .await_completion(&mut job, &cancel, |update| {
                {
                    let mut state = self.lock();
                    if state.generation == generation {
                        state.analysis_percent = update.percent;
                        if let Some(active) = state.job.as_mut() {
                            active.state = JobState::Polling;
                            active.attempts = update.attempt;
                        }
                    }
                }
                self.emit(SessionProgress::AnalysisPolled {
                    generation,
                    attempt: update.attempt,
                    max_attempts: update.max_attempts,
                    status: update.status.clone(),
                    percent: update.percent,
                });
            })
            .await;

        match completed {
            Ok(result) => self.apply_result(generation, job, result),
            Err(e) => {
                {
                    let mut state = self.lock();
                    if state.generation == generation {
                        state.job = Some(job);
                    }
                }
                self.fail_analysis(generation, prior_stage, e)
            }
        }
    }

    fn apply_result(
        &self,
        generation: u64,
        job: AnalysisJob,
        result: AnalysisResult,
    ) -> Result<Vec<PhotoGroup>, SessionError> {
        let groups = rank(&result);

        {
            let mut state = self.lock();
            Self::ensure_current(&state, generation)?;
            state.analysis_in_flight = false;
            state.job = Some(job);
            state.selection.rebuild(groups.clone());
            state.result = Some(Arc::new(result));
            state.analysis_percent = 100;
            state.stage = SessionStage::Results;
        }

        if groups.is_empty() {
            info!("Analysis finished with nothing to review");
        } else {
            info!("Analysis finished with {} groups", groups.len());
        }
        self.emit(SessionProgress::AnalysisComplete {
            generation,
            groups: groups.len(),
        });
        Ok(groups)
    }

    fn fail_analysis<T>(
        &self,
        generation: u64,
        prior_stage: SessionStage,
        error: SessionError,
    ) -> Result<T, SessionError> {
        {
            let mut state = self.lock();
            Self::ensure_current(&state, generation)?;
            state.analysis_in_flight = false;
            state.stage = prior_stage;
        }

        error!("Analysis failed: {}", error);
        self.emit(SessionProgress::AnalysisFailed {
            generation,
            error: error.to_string(),
        });
        Err(error)
    }

    // ========== Review ==========

    pub fn toggle_selection(&self, path: &str, included: bool) -> bool {
        self.lock().selection.toggle(path, included)
    }

    pub fn select_all_in_current_group(&self) {
        self.lock().selection.select_all_in_current_group();
    }

    pub fn clear_all_in_current_group(&self) {
        self.lock().selection.clear_all_in_current_group();
    }

    pub fn advance(&self) -> bool {
        self.lock().selection.advance()
    }

    pub fn retreat(&self) -> bool {
        self.lock().selection.retreat()
    }

    pub fn go_to(&self, index: usize) {
        self.lock().selection.go_to(index);
    }

    pub fn navigate(&self, to: Navigation) -> usize {
        self.lock().selection.navigate(to)
    }

    /// Archive of every selected photo
    pub async fn download_selected(&self) -> Result<Vec<u8>, SessionError> {
        let (generation, photos) = {
            let state = self.lock();
            let photos: Vec<GroupPhoto> = state
                .selection
                .selected_photos()
                .into_iter()
                .cloned()
                .collect();
            (state.generation, photos)
        };
        self.export(generation, photos).await
    }

    /// Archive of each group's best photo
    pub async fn download_best_per_group(&self) -> Result<Vec<u8>, SessionError> {
        let (generation, photos) = {
            let state = self.lock();
            let photos: Vec<GroupPhoto> = state
                .selection
                .groups()
                .iter()
                .filter_map(|group| group.best.clone())
                .collect();
            (state.generation, photos)
        };
        self.export(generation, photos).await
    }

    async fn export(
        &self,
        generation: u64,
        photos: Vec<GroupPhoto>,
    ) -> Result<Vec<u8>, SessionError> {
        let archive = build_archive(
            &self.storage,
            self.packer.as_ref(),
            &photos,
            self.config.download_concurrency,
        )
        .await?;

        Self::ensure_current(&self.lock(), generation)?;
        Ok(archive)
    }

    pub fn public_url(&self, path: &str) -> String {
        self.storage.public_url(path)
    }

    // ========== Teardown ==========

    /// Discard the session: stop polling, delete its stored photos, revoke
    /// every preview, then clear all local state. Local cleanup always
    /// completes, even when the remote delete fails.
    ///
    /// A teardown requested while another is running waits for it to
    /// finish, then tears down whatever session is current by then.
    pub async fn teardown(&self, reason: TeardownReason) -> Result<TeardownReport, SessionError> {
        let (generation, session_id) = loop {
            // Registered before the flag is checked so the wakeup cannot be missed
            let finished = self.teardown_done.notified();
            if let Some(started) = self.begin_teardown() {
                break started;
            }
            debug!("Waiting for the teardown in progress before {}", reason);
            finished.await;
        };

        info!("Tearing down session generation {} ({})", generation, reason);

        // 2. remote delete
        let mut cleanup_error = None;
        let remote_deleted = match &session_id {
            Some(session_id) => {
                match self
                    .storage
                    .delete_by_prefix(&self.owner_id, session_id.as_str())
                    .await
                {
                    Ok(true) => Some(true),
                    Ok(false) => {
                        warn!("Storage did not confirm deletion of session {}", session_id);
                        cleanup_error = Some(
                            SessionError::Cleanup(format!(
                                "storage did not confirm deletion of session {}",
                                session_id
                            ))
                            .to_string(),
                        );
                        Some(false)
                    }
                    Err(e) => {
                        warn!("Failed to delete session {}: {}", session_id, e);
                        cleanup_error = Some(SessionError::Cleanup(e.to_string()).to_string());
                        Some(false)
                    }
                }
            }
            None => None,
        };

        // 3. previews, 4. local state
        let (previews_released, photos_cleared) = {
            let mut state = self.lock();
            let released = state.previews.release_all();
            let cleared = state.clear_session();
            state.tearing_down = false;
            (released, cleared)
        };
        self.teardown_done.notify_waiters();

        info!(
            "Session generation {} torn down: {} photos cleared, {} previews released",
            generation, photos_cleared, previews_released
        );
        self.emit(SessionProgress::TornDown { generation, reason });

        Ok(TeardownReport {
            reason,
            generation,
            session_id: session_id.map(|id| id.to_string()),
            remote_deleted,
            previews_released,
            photos_cleared,
            cleanup_error,
        })
    }

    /// Mark a teardown as running and stop the session's work. Returns
    /// `None` while another teardown holds the flag.
    fn begin_teardown(&self) -> Option<(u64, Option<DurableSessionId>)> {
        let mut state = self.lock();
        if state.tearing_down {
            return None;
        }
        state.tearing_down = true;

        // 1. stop polling and drop the in-flight job
        state.cancel.cancel();
        if let Some(job) = state.job.take() {
            if !job.state.is_terminal() {
                debug!("Cancelled analysis job {} ({} polls)", job.job_id, job.attempts);
            }
        }

        let generation = state.generation;
        state.generation += 1;
        Some((generation, state.ledger.session_id().cloned()))
    }

    pub async fn reset(&self) -> Result<TeardownReport, SessionError> {
        self.teardown(TeardownReason::Reset).await
    }

    /// Tear down the current session, then start a new one with `selection`
    pub async fn start_new_session(
        &self,
        selection: PhotoSelection,
    ) -> Result<(TeardownReport, AdmissionReport), SessionError> {
        let report = self.teardown(TeardownReason::Replace).await?;
        let admitted = self.add_photos(selection).await?;
        Ok((report, admitted))
    }

    /// Tear down, then remove everything the owner still has in storage
    pub async fn sign_out(&self) -> Result<TeardownReport, SessionError> {
        let report = self.teardown(TeardownReason::SignOut).await?;

        match self.storage.delete_all(&self.owner_id).await {
            Ok(true) => debug!("Removed all stored photos for {}", self.owner_id),
            Ok(false) => warn!("Storage did not confirm removal of photos for {}", self.owner_id),
            Err(e) => warn!("Failed to remove photos for {}: {}", self.owner_id, e),
        }

        Ok(report)
    }

    /// Run `sign_out` when the identity provider signals a sign-out
    pub fn attach_sign_out(self: &Arc<Self>, signal: oneshot::Receiver<()>) -> JoinHandle<()> {
        let manager = self.clone();
        self.runtime_handle.spawn(async move {
            if signal.await.is_err() {
                debug!("Sign-out hook dropped without signalling");
                return;
            }
            if let Err(e) = manager.sign_out().await {
                error!("Sign-out teardown failed: {}", e);
            }
        })
    }

    // ========== Accessors ==========

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    pub fn stage(&self) -> SessionStage {
        self.lock().stage
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Photos in insertion order
    pub fn photos(&self) -> Vec<PhotoRecord> {
        self.lock().photos.iter().cloned().collect()
    }

    pub fn photo_count(&self) -> usize {
        self.lock().photos.len()
    }

    pub fn total_size_label(&self) -> String {
        self.lock().photos.total_size_label()
    }

    pub fn session_id(&self) -> Option<DurableSessionId> {
        self.lock().ledger.session_id().cloned()
    }

    pub fn analysis_mode(&self) -> AnalysisMode {
        self.lock().mode
    }

    pub fn job_state(&self) -> Option<JobState> {
        self.lock().job.as_ref().map(|job| job.state)
    }

    pub fn result(&self) -> Option<Arc<AnalysisResult>> {
        self.lock().result.clone()
    }

    pub fn groups(&self) -> Vec<PhotoGroup> {
        self.lock().selection.groups().to_vec()
    }

    pub fn current_group(&self) -> Option<PhotoGroup> {
        self.lock().selection.current_group().cloned()
    }

    pub fn cursor(&self) -> usize {
        self.lock().selection.cursor()
    }

    pub fn position(&self) -> String {
        self.lock().selection.position()
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.lock().selection.is_selected(path)
    }

    pub fn selected_paths(&self) -> Vec<String> {
        self.lock().selection.selected_paths()
    }

    pub fn summary(&self) -> Option<ReviewSummary> {
        let state = self.lock();
        state
            .result
            .as_ref()
            .map(|result| ReviewSummary::from_result(&result.statistics, state.selection.groups()))
    }

    pub fn upload_percent(&self) -> u8 {
        self.lock().upload_percent
    }

    pub fn analysis_percent(&self) -> u8 {
        self.lock().analysis_percent
    }

    pub fn is_preview_live(&self, handle: &PreviewHandle) -> bool {
        self.lock().previews.is_live(handle)
    }

    pub fn is_preview_revoked(&self, handle: &PreviewHandle) -> bool {
        self.lock().previews.is_revoked(handle)
    }

    pub fn outstanding_previews(&self) -> usize {
        self.lock().previews.outstanding()
    }
}
