use crate::config::{OverflowPolicy, SessionLimits};
use crate::models::{format_size, is_allowed_mime, ALLOWED_MIME_TYPES};
use crate::session::SessionPhotoSet;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid file type for {name}: {mime_type}. Allowed types: {}", ALLOWED_MIME_TYPES.join(", "))]
    TypeRejected { name: String, mime_type: String },
    #[error("File size too large: {name} is {size}. Maximum: {max}")]
    FileTooLarge {
        name: String,
        size: String,
        max: String,
    },
    #[error("Adding {name} would exceed the session size limit of {max}")]
    SessionBytesExceeded { name: String, max: String },
    #[error("You can only upload up to {max} photos ({name} was not added)")]
    CountExceeded { name: String, max: usize },
    #[error("File name is required")]
    MissingName,
    #[error("{name} was not added because the batch would exceed a session limit")]
    BatchRejected { name: String },
    #[error("Could not read {name}: {reason}")]
    Unreadable { name: String, reason: String },
    #[error("No photos to upload")]
    EmptySelection,
    #[error("Photos cannot be changed after upload; start a new session to add more")]
    SessionSealed,
}

/// A photo offered by a source, described before it is admitted
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub display_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct Rejection {
    pub id: String,
    pub error: ValidationError,
}

/// Outcome of screening a batch against the session and its caps
#[derive(Debug, Default)]
pub struct AdmissionPlan {
    /// Indices into the candidate slice, in batch order
    pub accepted: Vec<usize>,
    pub rejected: Vec<Rejection>,
    /// Ids already present in the session or repeated within the batch
    pub duplicates: Vec<String>,
}

/// Check a single candidate against type, name and per-file size rules
pub fn validate_candidate(
    candidate: &Candidate,
    limits: &SessionLimits,
) -> Result<(), ValidationError> {
    if candidate.display_name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }

    if !is_allowed_mime(&candidate.mime_type) {
        return Err(ValidationError::TypeRejected {
            name: candidate.display_name.clone(),
            mime_type: candidate.mime_type.clone(),
        });
    }

    if candidate.size_bytes > limits.max_file_bytes {
        return Err(ValidationError::FileTooLarge {
            name: candidate.display_name.clone(),
            size: format_size(candidate.size_bytes),
            max: format_size(limits.max_file_bytes),
        });
    }

    Ok(())
}

/// Decide which candidates of a batch can join the session.
///
/// The count and byte caps are shared by every source. Under
/// `RejectOverflow` only the items that would breach a cap are rejected;
/// under `RejectBatch` a single breach rejects every otherwise valid item.
pub fn plan_admission(
    candidates: &[Candidate],
    set: &SessionPhotoSet,
    limits: &SessionLimits,
) -> AdmissionPlan {
    let mut plan = AdmissionPlan::default();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut count = set.len();
    let mut bytes = set.total_bytes();
    let mut overflowed = false;

    for (index, candidate) in candidates.iter().enumerate() {
        if set.contains(&candidate.id) || !seen.insert(candidate.id.as_str()) {
            plan.duplicates.push(candidate.id.clone());
            continue;
        }

        if let Err(error) = validate_candidate(candidate, limits) {
            plan.rejected.push(Rejection {
                id: candidate.id.clone(),
                error,
            });
            continue;
        }

        let overflow = if count + 1 > limits.max_photos {
            Some(ValidationError::CountExceeded {
                name: candidate.display_name.clone(),
                max: limits.max_photos,
            })
        } else if bytes + candidate.size_bytes > limits.max_session_bytes {
            Some(ValidationError::SessionBytesExceeded {
                name: candidate.display_name.clone(),
                max: format_size(limits.max_session_bytes),
            })
        } else {
            None
        };

        match overflow {
            Some(error) => {
                overflowed = true;
                plan.rejected.push(Rejection {
                    id: candidate.id.clone(),
                    error,
                });
            }
            None => {
                count += 1;
                bytes += candidate.size_bytes;
                plan.accepted.push(index);
            }
        }
    }

    if overflowed && limits.overflow_policy == OverflowPolicy::RejectBatch {
        for index in plan.accepted.drain(..) {
            let candidate = &candidates[index];
            plan.rejected.push(Rejection {
                id: candidate.id.clone(),
                error: ValidationError::BatchRejected {
                    name: candidate.display_name.clone(),
                },
            });
        }
    }

    plan
}
