use crate::grouping::{GroupPhoto, PhotoGroup};
use std::collections::BTreeSet;

/// A move of the navigation cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
    First,
    Last,
    To(usize),
}

/// Which photos are marked for export and which group is on screen.
///
/// The selection survives navigation. Installing a new ranking resets the
/// cursor and clears the selection so paths from an earlier analysis never
/// carry over.
#[derive(Debug, Default, Clone)]
pub struct SelectionState {
    groups: Vec<PhotoGroup>,
    cursor: usize,
    selected: BTreeSet<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly ranked group list
    pub fn rebuild(&mut self, groups: Vec<PhotoGroup>) {
        self.groups = groups;
        self.cursor = 0;
        self.selected.clear();
    }

    pub fn clear(&mut self) {
        self.rebuild(Vec::new());
    }

    pub fn groups(&self) -> &[PhotoGroup] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_group(&self) -> Option<&PhotoGroup> {
        self.groups.get(self.cursor)
    }

    /// `"k of n"` for the current group, `"0 of 0"` when empty
    pub fn position(&self) -> String {
        if self.groups.is_empty() {
            "0 of 0".to_string()
        } else {
            format!("{} of {}", self.cursor + 1, self.groups.len())
        }
    }

    /// Include or exclude one photo. Unknown paths are ignored and return false.
    pub fn toggle(&mut self, path: &str, included: bool) -> bool {
        if !self.groups.iter().any(|g| g.contains(path)) {
            return false;
        }
        if included {
            self.selected.insert(path.to_string());
        } else {
            self.selected.remove(path);
        }
        true
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.selected.contains(path)
    }

    pub fn select_all_in_current_group(&mut self) {
        if let Some(group) = self.groups.get(self.cursor) {
            for path in group.paths() {
                self.selected.insert(path.to_string());
            }
        }
    }

    pub fn clear_all_in_current_group(&mut self) {
        if let Some(group) = self.groups.get(self.cursor) {
            for path in group.paths() {
                self.selected.remove(path);
            }
        }
    }

    pub fn selected_in_current_group(&self) -> usize {
        self.current_group()
            .map(|g| g.paths().filter(|p| self.selected.contains(*p)).count())
            .unwrap_or(0)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Selected photos in display order (group order, then member order)
    pub fn selected_photos(&self) -> Vec<&GroupPhoto> {
        let mut seen = BTreeSet::new();
        self.groups
            .iter()
            .flat_map(|g| g.photos.iter())
            .filter(|p| self.selected.contains(&p.path) && seen.insert(p.path.as_str()))
            .collect()
    }

    pub fn selected_paths(&self) -> Vec<String> {
        self.selected_photos()
            .into_iter()
            .map(|p| p.path.clone())
            .collect()
    }

    /// Move to the next group; no-op on the last one
    pub fn advance(&mut self) -> bool {
        if self.cursor + 1 < self.groups.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Move to the previous group; no-op on the first one
    pub fn retreat(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    /// Jump to a group, clamped into range
    pub fn go_to(&mut self, index: usize) {
        self.cursor = index.min(self.groups.len().saturating_sub(1));
    }

    /// Apply a cursor move and return the new cursor
    pub fn navigate(&mut self, to: Navigation) -> usize {
        match to {
            Navigation::Next => {
                self.advance();
            }
            Navigation::Previous => {
                self.retreat();
            }
            Navigation::First => self.go_to(0),
            Navigation::Last => self.go_to(usize::MAX),
            Navigation::To(index) => self.go_to(index),
        }
        self.cursor
    }
}
