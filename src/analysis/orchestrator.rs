use super::client::AnalysisService;
use super::types::{AnalysisMode, AnalysisResult, JobStatus};
use crate::config::PollingConfig;
use crate::error::SessionError;
use crate::upload::DurableSessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Comparison is undefined for fewer photos than this
pub const MIN_PHOTOS_FOR_ANALYSIS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Submitted | JobState::Polling)
    }
}

/// One remote analysis invocation
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub job_id: String,
    pub session_id: DurableSessionId,
    pub mode: AnalysisMode,
    pub state: JobState,
    /// Status queries made so far
    pub attempts: u32,
}

/// Reported after every status query
#[derive(Debug, Clone, PartialEq)]
pub struct PollUpdate {
    pub attempt: u32,
    pub max_attempts: u32,
    pub status: JobStatus,
    pub percent: u8,
}

/// Submits analysis jobs and drives them to a terminal state by polling
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    service: Arc<dyn AnalysisService>,
    polling: PollingConfig,
}

impl AnalysisOrchestrator {
    pub fn new(service: Arc<dyn AnalysisService>, polling: PollingConfig) -> Self {
        Self { service, polling }
    }

    pub fn service(&self) -> &Arc<dyn AnalysisService> {
        &self.service
    }

    /// Start a job. Fails fast, without contacting the service, when the
    /// session holds fewer than two photos.
    pub async fn submit(
        &self,
        session_id: &DurableSessionId,
        owner_id: &str,
        mode: AnalysisMode,
        photo_count: usize,
    ) -> Result<AnalysisJob, SessionError> {
        if photo_count < MIN_PHOTOS_FOR_ANALYSIS {
            return Err(SessionError::InsufficientInput { found: photo_count });
        }

        let job_id = self
            .service
            .submit(session_id.as_str(), owner_id, mode)
            .await?;

        info!(
            "Submitted {} analysis for session {} ({} photos)",
            mode, session_id, photo_count
        );

        Ok(AnalysisJob {
            job_id,
            session_id: session_id.clone(),
            mode,
            state: JobState::Submitted,
            attempts: 0,
        })
    }

    /// Poll until the job completes, fails, or runs out of attempts.
    ///
    /// `not_found` is treated as "not ready yet" and waits longer before the
    /// next query. Cancelling `cancel` stops polling at the next suspension
    /// point and yields `SessionError::Stale`.
    pub async fn await_completion<F>(
        &self,
        job: &mut AnalysisJob,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<AnalysisResult, SessionError>
    where
        F: FnMut(&PollUpdate),
    {
        job.state = JobState::Polling;

        if !pause(self.polling.submit_settle, cancel).await {
            job.state = JobState::Cancelled;
            return Err(SessionError::Stale);
        }

        let session_id = job.session_id.clone();
        let max_attempts = self.polling.max_attempts;
        let mut last_error = None;

        while job.attempts < max_attempts {
            if cancel.is_cancelled() {
                job.state = JobState::Cancelled;
                return Err(SessionError::Stale);
            }

            job.attempts += 1;
            let polled = tokio::select! {
                _ = cancel.cancelled() => {
                    job.state = JobState::Cancelled;
                    return Err(SessionError::Stale);
                }
                polled = self.service.status(session_id.as_str()) => polled,
            };

            let wait = match polled {
                Ok(status) => {
                    last_error = None;
                    on_progress(&PollUpdate {
                        attempt: job.attempts,
                        max_attempts,
                        status: status.clone(),
                        percent: progress_percent(&status),
                    });

                    match status {
                        JobStatus::Completed => {
                            return self.fetch_results(job, cancel).await;
                        }
                        JobStatus::Failed { message } => {
                            warn!("Analysis for session {} failed: {}", job.session_id, message);
                            job.state = JobState::Failed;
                            return Err(SessionError::AnalysisFailed(message));
                        }
                        JobStatus::NotFound => {
                            debug!(
                                "Analysis not found for session {} yet, backing off",
                                job.session_id
                            );
                            self.polling.not_found_backoff()
                        }
                        JobStatus::Processing => self.polling.interval,
                    }
                }
                Err(e) => {
                    warn!(
                        "Status check {}/{} for session {} failed: {}",
                        job.attempts, max_attempts, job.session_id, e
                    );
                    last_error = Some(e);
                    self.polling.interval
                }
            };

            if job.attempts >= max_attempts {
                break;
            }

            if !pause(wait, cancel).await {
                job.state = JobState::Cancelled;
                return Err(SessionError::Stale);
            }
        }

        if let Some(e) = last_error {
            job.state = JobState::Failed;
            return Err(SessionError::AnalysisService(e));
        }

        warn!(
            "Analysis for session {} timed out after {} status checks",
            job.session_id, job.attempts
        );
        job.state = JobState::TimedOut;
        Err(SessionError::AnalysisTimedOut {
            attempts: job.attempts,
        })
    }

    async fn fetch_results(
        &self,
        job: &mut AnalysisJob,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, SessionError> {
        let session_id = job.session_id.clone();
        let fetched = tokio::select! {
            _ = cancel.cancelled() => {
                job.state = JobState::Cancelled;
                return Err(SessionError::Stale);
            }
            fetched = self.service.results(session_id.as_str()) => fetched,
        };

        match fetched {
            Ok(result) => {
                info!(
                    "Analysis for session {} completed with {} groups",
                    job.session_id,
                    result.groups.len()
                );
                job.state = JobState::Completed;
                Ok(result)
            }
            Err(e) => {
                job.state = JobState::Failed;
                Err(SessionError::AnalysisService(e))
            }
        }
    }
}

fn progress_percent(status: &JobStatus) -> u8 {
    match status {
        JobStatus::Completed => 100,
        JobStatus::Processing => 50,
        JobStatus::NotFound | JobStatus::Failed { .. } => 0,
    }
}

/// Sleep unless cancelled first. Returns false when cancelled.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
