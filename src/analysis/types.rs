use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which comparison the remote service runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnalysisMode {
    /// Pixel comparison for exact and near-exact duplicates
    #[default]
    #[serde(rename = "pixel")]
    ExactDuplicate,
    /// Content comparison for visually similar photos
    #[serde(rename = "ai")]
    SimilarContent,
}

impl AnalysisMode {
    pub fn wire_name(&self) -> &'static str {
        match self {
            AnalysisMode::ExactDuplicate => "pixel",
            AnalysisMode::SimilarContent => "ai",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::ExactDuplicate => f.write_str("exact-duplicate"),
            AnalysisMode::SimilarContent => f.write_str("similar-content"),
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pixel" | "exact" | "exact-duplicate" => Ok(AnalysisMode::ExactDuplicate),
            "ai" | "similar" | "similar-content" => Ok(AnalysisMode::SimilarContent),
            other => Err(format!("Unknown analysis mode: {}", other)),
        }
    }
}

/// Remote job status as reported by one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    Completed,
    Failed { message: String },
    NotFound,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Processing => f.write_str("processing"),
            JobStatus::Completed => f.write_str("completed"),
            JobStatus::Failed { message } => write!(f, "failed ({})", message),
            JobStatus::NotFound => f.write_str("not_found"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    Duplicate,
    Similar,
    Unique,
}

impl GroupType {
    /// Higher sorts first
    pub fn priority(&self) -> u8 {
        match self {
            GroupType::Duplicate => 2,
            GroupType::Similar => 1,
            GroupType::Unique => 0,
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupType::Duplicate => f.write_str("duplicate"),
            GroupType::Similar => f.write_str("similar"),
            GroupType::Unique => f.write_str("unique"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityMetrics {
    pub overall_score: f64,
    pub resolution_score: f64,
    pub sharpness_score: f64,
    pub brightness_score: f64,
    pub contrast_score: f64,
    pub noise_score: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    pub path: String,
    #[serde(default)]
    pub quality: QualityMetrics,
    #[serde(default)]
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGroup {
    pub id: String,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    #[serde(default)]
    pub images: Vec<RawImage>,
    #[serde(default)]
    pub best_image: Option<RawImage>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub similarity_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisStatistics {
    pub total_images: usize,
    pub total_groups: usize,
    pub duplicate_count: usize,
    pub similar_count: usize,
    pub unique_count: usize,
    pub estimated_space_saved_bytes: u64,
    pub estimated_space_saved_mb: f64,
}

/// Immutable snapshot returned by a completed analysis job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub session_id: String,
    pub groups: Vec<RawGroup>,
    pub statistics: AnalysisStatistics,
}
