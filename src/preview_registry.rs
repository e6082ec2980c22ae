use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Locally allocated reference a presentation layer can display a photo through
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracks preview handles so every allocation is paired with exactly one release.
///
/// Revoked handles are remembered for the current session and the one
/// released last; anything older is forgotten at the next `release_all`.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    /// handle -> owning photo id
    live: HashMap<PreviewHandle, String>,
    /// Revoked one at a time since the last `release_all`
    revoked: HashSet<PreviewHandle>,
    /// Everything revoked in the session the last `release_all` ended
    last_released: HashSet<PreviewHandle>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh handle on behalf of `photo_id`
    pub fn allocate(&mut self, photo_id: &str) -> PreviewHandle {
        let handle = PreviewHandle(format!("preview://{}", Uuid::new_v4()));
        self.live.insert(handle.clone(), photo_id.to_string());
        debug!("Allocated preview {} for {}", handle, photo_id);
        handle
    }

    /// Release one handle. Returns false if it was not live (already revoked or unknown).
    pub fn revoke(&mut self, handle: &PreviewHandle) -> bool {
        match self.live.remove(handle) {
            Some(photo_id) => {
                debug!("Revoked preview {} for {}", handle, photo_id);
                self.revoked.insert(handle.clone());
                true
            }
            None => {
                warn!("Ignoring revoke of preview {} that is not live", handle);
                false
            }
        }
    }

    /// Release every outstanding handle, returning how many were released
    pub fn release_all(&mut self) -> usize {
        let count = self.live.len();
        if count == 0 && self.revoked.is_empty() {
            return 0;
        }

        let mut released = std::mem::take(&mut self.revoked);
        released.extend(self.live.drain().map(|(handle, _)| handle));
        self.last_released = released;
        if count > 0 {
            debug!("Released {} outstanding previews", count);
        }
        count
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live.contains_key(handle)
    }

    pub fn is_revoked(&self, handle: &PreviewHandle) -> bool {
        self.revoked.contains(handle) || self.last_released.contains(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.live.len()
    }

    /// Photo a live handle was allocated for
    pub fn owner_of(&self, handle: &PreviewHandle) -> Option<&str> {
        self.live.get(handle).map(String::as_str)
    }
}
