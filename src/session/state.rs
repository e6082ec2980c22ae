use super::SessionPhotoSet;
use crate::analysis::{AnalysisJob, AnalysisMode, AnalysisResult};
use crate::preview_registry::PreviewRegistry;
use crate::selection::SelectionState;
use crate::upload::UploadLedger;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where the session is in its workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStage {
    /// Collecting photos
    #[default]
    Upload,
    /// Photos persisted, waiting for analysis
    Preview,
    /// Analysis job running
    Processing,
    /// Ranked groups available for review
    Results,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStage::Upload => f.write_str("upload"),
            SessionStage::Preview => f.write_str("preview"),
            SessionStage::Processing => f.write_str("processing"),
            SessionStage::Results => f.write_str("results"),
        }
    }
}

/// Why a session is being torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    SignOut,
    Reset,
    Replace,
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownReason::SignOut => f.write_str("sign-out"),
            TeardownReason::Reset => f.write_str("reset"),
            TeardownReason::Replace => f.write_str("replace"),
        }
    }
}

/// What a teardown did
#[derive(Debug, Clone, PartialEq)]
pub struct TeardownReport {
    pub reason: TeardownReason,
    /// Generation that was torn down
    pub generation: u64,
    /// Durable session id whose prefix was deleted, if one had been minted
    pub session_id: Option<String>,
    /// `None` when nothing had been persisted, otherwise whether the store confirmed the delete
    pub remote_deleted: Option<bool>,
    pub previews_released: usize,
    pub photos_cleared: usize,
    /// Logged remote cleanup failure; never blocks local cleanup
    pub cleanup_error: Option<String>,
}

/// Everything owned by the active session.
///
/// The preview registry outlives individual sessions so handles released by
/// a teardown can still be checked afterwards.
pub(crate) struct SessionState {
    pub generation: u64,
    pub stage: SessionStage,
    pub photos: SessionPhotoSet,
    pub previews: PreviewRegistry,
    pub ledger: UploadLedger,
    pub mode: AnalysisMode,
    pub mode_locked: bool,
    pub job: Option<AnalysisJob>,
    pub result: Option<Arc<AnalysisResult>>,
    pub selection: SelectionState,
    pub cancel: CancellationToken,
    pub commit_in_flight: bool,
    pub analysis_in_flight: bool,
    pub tearing_down: bool,
    pub upload_percent: u8,
    pub analysis_percent: u8,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            generation: 1,
            stage: SessionStage::Upload,
            photos: SessionPhotoSet::new(),
            previews: PreviewRegistry::new(),
            ledger: UploadLedger::new(),
            mode: AnalysisMode::default(),
            mode_locked: false,
            job: None,
            result: None,
            selection: SelectionState::new(),
            cancel: CancellationToken::new(),
            commit_in_flight: false,
            analysis_in_flight: false,
            tearing_down: false,
            upload_percent: 0,
            analysis_percent: 0,
        }
    }

    /// Clear every per-session field, returning how many photos were dropped.
    /// Generation and the preview registry are left alone.
    pub fn clear_session(&mut self) -> usize {
        let cleared = self.photos.clear().len();
        self.selection.clear();
        self.ledger.clear();
        self.result = None;
        self.job = None;
        self.stage = SessionStage::Upload;
        self.mode = AnalysisMode::default();
        self.mode_locked = false;
        self.cancel = CancellationToken::new();
        self.commit_in_flight = false;
        self.analysis_in_flight = false;
        self.upload_percent = 0;
        self.analysis_percent = 0;
        cleared
    }
}
