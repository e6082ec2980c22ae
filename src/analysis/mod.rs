// # Analysis Module
//
// - **AnalysisService**: the remote duplicate-detection service (HTTP in production)
// - **AnalysisOrchestrator**: submits a job and polls it to a terminal state
// - **types**: wire types for modes, statuses and raw results

mod client;
mod orchestrator;
mod types;

pub use client::{AnalysisService, AnalysisServiceError, HttpAnalysisService};
pub use orchestrator::{
    AnalysisJob, AnalysisOrchestrator, JobState, PollUpdate, MIN_PHOTOS_FOR_ANALYSIS,
};
pub use types::{
    AnalysisMode, AnalysisResult, AnalysisStatistics, GroupType, JobStatus, QualityMetrics,
    RawGroup, RawImage,
};
