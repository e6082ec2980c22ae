use crate::models::{format_size, PhotoRecord};
use std::collections::HashSet;

/// Insertion-ordered set of the photos that make up the active session.
///
/// Ids are unique regardless of origin; `insert` refuses a record whose id
/// is already present.
#[derive(Debug, Default)]
pub struct SessionPhotoSet {
    records: Vec<PhotoRecord>,
    ids: HashSet<String>,
}

impl SessionPhotoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns false (and drops nothing) if a record with the same id exists
    pub fn insert(&mut self, record: PhotoRecord) -> bool {
        if !self.ids.insert(record.id.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<PhotoRecord> {
        if !self.ids.remove(id) {
            return None;
        }
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&PhotoRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.size_bytes).sum()
    }

    pub fn total_size_label(&self) -> String {
        format_size(self.total_bytes())
    }

    /// Empty the set in one step, handing back the removed records
    pub fn clear(&mut self) -> Vec<PhotoRecord> {
        self.ids.clear();
        std::mem::take(&mut self.records)
    }
}
