use crate::analysis::AnalysisServiceError;
use crate::cloud_storage::StorageError;
use crate::sources::ValidationError;
use crate::upload::UploadFailure;
use std::fmt;
use thiserror::Error;

/// Stage of the session workflow an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Validation,
    Upload,
    Analysis,
    Cleanup,
    Export,
    Session,
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorStage::Validation => "validation",
            ErrorStage::Upload => "upload",
            ErrorStage::Analysis => "analysis",
            ErrorStage::Cleanup => "cleanup",
            ErrorStage::Export => "export",
            ErrorStage::Session => "session",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the session engine to the presentation layer.
///
/// Every variant leaves the session either in its previous stable stage or
/// torn down; none of them leaves partially applied state behind.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Upload(#[from] UploadFailure),
    #[error("Please add at least 2 photos for analysis (found {found})")]
    InsufficientInput { found: usize },
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),
    #[error("Analysis timed out after {attempts} status checks")]
    AnalysisTimedOut { attempts: u32 },
    #[error("Analysis service error: {0}")]
    AnalysisService(#[from] AnalysisServiceError),
    #[error("Cleanup failed: {0}")]
    Cleanup(String),
    #[error("Export failed: {0}")]
    Export(String),
    #[error("Another {0} is already in progress")]
    Busy(&'static str),
    #[error("{0}")]
    InvalidState(String),
    #[error("The session was reset before this operation finished")]
    Stale,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Stage the presentation layer should attribute this error to
    pub fn stage(&self) -> ErrorStage {
        match self {
            SessionError::Validation(_) => ErrorStage::Validation,
            SessionError::Upload(_) => ErrorStage::Upload,
            SessionError::InsufficientInput { .. } => ErrorStage::Analysis,
            SessionError::AnalysisFailed(_) => ErrorStage::Analysis,
            SessionError::AnalysisTimedOut { .. } => ErrorStage::Analysis,
            SessionError::AnalysisService(_) => ErrorStage::Analysis,
            SessionError::Cleanup(_) => ErrorStage::Cleanup,
            SessionError::Export(_) => ErrorStage::Export,
            SessionError::Storage(_) => ErrorStage::Export,
            SessionError::Busy(_) | SessionError::InvalidState(_) | SessionError::Stale => {
                ErrorStage::Session
            }
        }
    }

    /// Whether the user can recover by retrying or fixing their selection
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SessionError::Stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_attribution() {
        assert_eq!(
            SessionError::InsufficientInput { found: 1 }.stage(),
            ErrorStage::Analysis
        );
        assert_eq!(
            SessionError::AnalysisTimedOut { attempts: 60 }.stage(),
            ErrorStage::Analysis
        );
        assert_eq!(SessionError::Busy("upload").stage(), ErrorStage::Session);
        assert_eq!(
            SessionError::Cleanup("bucket gone".into()).stage(),
            ErrorStage::Cleanup
        );
    }

    #[test]
    fn test_messages_are_short_and_actionable() {
        let err = SessionError::InsufficientInput { found: 1 };
        assert_eq!(
            err.to_string(),
            "Please add at least 2 photos for analysis (found 1)"
        );
        assert_eq!(
            SessionError::AnalysisTimedOut { attempts: 3 }.to_string(),
            "Analysis timed out after 3 status checks"
        );
    }
}
