// # Grouping & Ranking
//
// Turns a raw `AnalysisResult` into the ordered list of groups the review
// screen walks through. Ordering is a pure function of the result:
// duplicate groups first, then similar, then unique; within a type larger
// groups first, then higher similarity. The sort is stable, so groups with
// equal keys keep the order the service returned them in.

use crate::analysis::{AnalysisResult, AnalysisStatistics, GroupType, QualityMetrics, RawImage};
use crate::models::format_size;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// One member photo of a ranked group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPhoto {
    /// Storage path, the identity used by selection and export
    pub path: String,
    /// Best-effort name for display and archive entries
    pub filename: String,
    pub quality: QualityMetrics,
    pub file_size: u64,
}

/// Display-ready projection of one raw group
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoGroup {
    pub id: String,
    pub group_type: GroupType,
    pub photos: Vec<GroupPhoto>,
    pub best: Option<GroupPhoto>,
    pub count: usize,
    pub similarity_score: f64,
}

impl PhotoGroup {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.photos.iter().map(|p| p.path.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.photos.iter().any(|p| p.path == path)
    }
}

/// Rank the groups of an analysis result
pub fn rank(result: &AnalysisResult) -> Vec<PhotoGroup> {
    let session_id = result.session_id.as_str();

    let mut groups: Vec<PhotoGroup> = result
        .groups
        .iter()
        .map(|raw| {
            let photos: Vec<GroupPhoto> = raw
                .images
                .iter()
                .map(|image| to_group_photo(image, session_id))
                .collect();

            let best = raw
                .best_image
                .as_ref()
                .map(|image| to_group_photo(image, session_id))
                .or_else(|| highest_scoring(&photos));

            let count = if photos.is_empty() {
                raw.count
            } else {
                photos.len()
            };

            PhotoGroup {
                id: raw.id.clone(),
                group_type: raw.group_type,
                photos,
                best,
                count,
                similarity_score: raw.similarity_score,
            }
        })
        .collect();

    // sort_by is stable
    groups.sort_by(compare_groups);
    groups
}

fn compare_groups(a: &PhotoGroup, b: &PhotoGroup) -> Ordering {
    b.group_type
        .priority()
        .cmp(&a.group_type.priority())
        .then_with(|| b.count.cmp(&a.count))
        .then_with(|| b.similarity_score.total_cmp(&a.similarity_score))
}

fn to_group_photo(image: &RawImage, session_id: &str) -> GroupPhoto {
    GroupPhoto {
        path: image.path.clone(),
        filename: resolve_display_filename(&image.path, session_id),
        quality: image.quality.clone(),
        file_size: image.file_size,
    }
}

fn highest_scoring(photos: &[GroupPhoto]) -> Option<GroupPhoto> {
    photos
        .iter()
        .max_by(|a, b| {
            a.quality
                .overall_score
                .total_cmp(&b.quality.overall_score)
        })
        .cloned()
}

fn image_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)([^_/\\]+\.(?:jpe?g|png|gif|webp|bmp|tiff?))").ok())
        .as_ref()
}

/// Map a storage path to a display filename.
///
/// Strips a `<session>_` prefix from the last path segment when present,
/// otherwise recovers the last `name.ext` run with a known image extension.
/// Falls back to the segment itself.
pub fn resolve_display_filename(path: &str, session_id: &str) -> String {
    let segment = path.rsplit(['/', '\\']).next().unwrap_or(path);

    if !session_id.is_empty() {
        if let Some(rest) = segment.strip_prefix(session_id) {
            if let Some(name) = rest.strip_prefix('_') {
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }

    image_name_pattern()
        .and_then(|pattern| pattern.find_iter(segment).last())
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| segment.to_string())
}

/// Totals shown above the review list
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSummary {
    pub total_images: usize,
    pub total_groups: usize,
    pub duplicate_groups: usize,
    pub similar_groups: usize,
    pub unique_groups: usize,
    pub space_saved_bytes: u64,
    pub space_saved_label: String,
}

impl ReviewSummary {
    /// Prefer the service's statistics, filling gaps from the ranked groups
    pub fn from_result(statistics: &AnalysisStatistics, groups: &[PhotoGroup]) -> Self {
        let count_of = |kind: GroupType| groups.iter().filter(|g| g.group_type == kind).count();

        let total_images = if statistics.total_images > 0 {
            statistics.total_images
        } else {
            groups.iter().map(|g| g.count).sum()
        };
        let total_groups = if statistics.total_groups > 0 {
            statistics.total_groups
        } else {
            groups.len()
        };

        let space_saved_bytes = if statistics.estimated_space_saved_bytes > 0 {
            statistics.estimated_space_saved_bytes
        } else {
            (statistics.estimated_space_saved_mb * 1024.0 * 1024.0).max(0.0) as u64
        };

        Self {
            total_images,
            total_groups,
            duplicate_groups: count_of(GroupType::Duplicate),
            similar_groups: count_of(GroupType::Similar),
            unique_groups: count_of(GroupType::Unique),
            space_saved_bytes,
            space_saved_label: format_size(space_saved_bytes),
        }
    }
}
