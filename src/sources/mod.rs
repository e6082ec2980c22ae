// # Source Adapters
//
// Each adapter turns a source-specific selection into `FetchedPhoto`s:
//
// - **LocalUploadAdapter**: files picked on this device (paths or in-memory bytes)
// - **DriveAdapter**: files picked from the cloud drive, screened on metadata
//   before any bytes are downloaded
//
// `admit_into` is the single place fetched photos join the session: it re-runs
// admission against the current set, allocates previews and inserts records.

mod drive;
mod local;
mod validation;

pub use drive::{DriveAdapter, DriveApi, DriveError, DriveFile, HttpDriveApi};
pub use local::{LocalFile, LocalUploadAdapter};
pub use validation::{
    plan_admission, validate_candidate, AdmissionPlan, Candidate, Rejection, ValidationError,
};

use crate::config::SessionLimits;
use crate::models::{PhotoRecord, SourceKind};
use crate::preview_registry::PreviewRegistry;
use crate::session::SessionPhotoSet;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// A photo whose bytes are in hand, ready to be admitted
#[derive(Debug, Clone)]
pub struct FetchedPhoto {
    pub candidate: Candidate,
    pub source: SourceKind,
    pub bytes: Arc<[u8]>,
}

/// What happened to each photo of one selection event
#[derive(Debug, Default, Clone)]
pub struct AdmissionReport {
    pub admitted: Vec<String>,
    pub rejected: Vec<Rejection>,
    pub duplicates: Vec<String>,
}

impl AdmissionReport {
    pub fn merge_rejections(&mut self, rejected: Vec<Rejection>) {
        self.rejected.extend(rejected);
    }

    pub fn merge_duplicates(&mut self, duplicates: Vec<String>) {
        for id in duplicates {
            if !self.duplicates.contains(&id) {
                self.duplicates.push(id);
            }
        }
    }
}

/// Admit fetched photos into the session set, allocating a preview for each
/// one that is accepted.
pub fn admit_into(
    set: &mut SessionPhotoSet,
    previews: &mut PreviewRegistry,
    fetched: Vec<FetchedPhoto>,
    limits: &SessionLimits,
) -> AdmissionReport {
    let candidates: Vec<Candidate> = fetched.iter().map(|f| f.candidate.clone()).collect();
    let plan = plan_admission(&candidates, set, limits);

    let mut slots: Vec<Option<FetchedPhoto>> = fetched.into_iter().map(Some).collect();
    let mut report = AdmissionReport {
        admitted: Vec::with_capacity(plan.accepted.len()),
        rejected: plan.rejected,
        duplicates: plan.duplicates,
    };

    for index in plan.accepted {
        let Some(photo) = slots[index].take() else {
            continue;
        };

        let preview = previews.allocate(&photo.candidate.id);
        let record = PhotoRecord {
            id: photo.candidate.id,
            source: photo.source,
            display_name: photo.candidate.display_name,
            mime_type: photo.candidate.mime_type,
            size_bytes: photo.candidate.size_bytes,
            bytes: photo.bytes,
            preview: Some(preview),
            added_at: Utc::now(),
        };

        report.admitted.push(record.id.clone());
        set.insert(record);
    }

    info!(
        "Admitted {} photos ({} rejected, {} duplicates), session now holds {} ({})",
        report.admitted.len(),
        report.rejected.len(),
        report.duplicates.len(),
        set.len(),
        set.total_size_label()
    );

    report
}
