use super::types::{AnalysisMode, AnalysisResult, AnalysisStatistics, JobStatus, RawGroup};
use reqwest::{Client, Error as ReqwestError, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum AnalysisServiceError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),
    #[error("HTTP error! status: {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Service rejected the request: {0}")]
    Rejected(String),
}

/// Trait for the remote duplicate-detection service (allows mocking for tests)
#[async_trait::async_trait]
pub trait AnalysisService: Send + Sync {
    /// Start a job for the session, returning the job id
    async fn submit(
        &self,
        session_id: &str,
        owner_id: &str,
        mode: AnalysisMode,
    ) -> Result<String, AnalysisServiceError>;

    async fn status(&self, session_id: &str) -> Result<JobStatus, AnalysisServiceError>;

    async fn results(&self, session_id: &str) -> Result<AnalysisResult, AnalysisServiceError>;

    async fn health(&self) -> Result<(), AnalysisServiceError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    session_id: &'a str,
    user_id: &'a str,
    analysis_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    #[serde(default)]
    success: bool,
    session_id: String,
    result: ResultBody,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    #[serde(default)]
    groups: Vec<RawGroup>,
    #[serde(default)]
    statistics: AnalysisStatistics,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the analysis service
#[derive(Clone)]
pub struct HttpAnalysisService {
    client: Client,
    base_url: String,
}

impl HttpAnalysisService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn error_for(response: reqwest::Response) -> AnalysisServiceError {
        let status = response.status().as_u16();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_default();
        AnalysisServiceError::Http { status, message }
    }
}

#[async_trait::async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn submit(
        &self,
        session_id: &str,
        owner_id: &str,
        mode: AnalysisMode,
    ) -> Result<String, AnalysisServiceError> {
        let url = format!("{}/analyze", self.base_url);
        let body = SubmitRequest {
            session_id,
            user_id: owner_id,
            analysis_type: mode.wire_name(),
        };

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let submitted: SubmitResponse = response.json().await?;
        if !submitted.success {
            return Err(AnalysisServiceError::Rejected(
                submitted
                    .message
                    .unwrap_or_else(|| "analysis was not started".to_string()),
            ));
        }

        debug!("Submitted analysis for session {}", session_id);
        Ok(submitted
            .session_id
            .unwrap_or_else(|| session_id.to_string()))
    }

    async fn status(&self, session_id: &str) -> Result<JobStatus, AnalysisServiceError> {
        let url = format!("{}/analysis-status/{}", self.base_url, session_id);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(JobStatus::NotFound);
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let body: StatusResponse = response.json().await?;
        Ok(match body.status.as_str() {
            "completed" => JobStatus::Completed,
            "not_found" => JobStatus::NotFound,
            "error" | "failed" => JobStatus::Failed {
                message: body
                    .error
                    .or(body.message)
                    .unwrap_or_else(|| "Analysis failed".to_string()),
            },
            _ => JobStatus::Processing,
        })
    }

    async fn results(&self, session_id: &str) -> Result<AnalysisResult, AnalysisServiceError> {
        let url = format!("{}/results/{}", self.base_url, session_id);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let body: ResultsResponse = response.json().await?;
        if !body.success {
            return Err(AnalysisServiceError::Rejected(
                body.result
                    .error
                    .unwrap_or_else(|| "results unavailable".to_string()),
            ));
        }

        Ok(AnalysisResult {
            session_id: body.session_id,
            groups: body.result.groups,
            statistics: body.result.statistics,
        })
    }

    async fn health(&self) -> Result<(), AnalysisServiceError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_for(response).await)
        }
    }
}
