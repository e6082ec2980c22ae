// # Session Module
//
// - **SessionPhotoSet**: the merged, de-duplicated photos of the active session
// - **SessionManager**: drives add → commit → analyze → review and owns teardown
// - **state**: stage machine, teardown reasons and reports
//
// Stages advance `upload → preview → processing → results`; a teardown from
// any stage returns to `upload` with every local and remote resource released.

mod manager;
mod photo_set;
mod state;

pub use manager::{PhotoSelection, SessionManager, SessionServices};
pub use photo_set::SessionPhotoSet;
pub use state::{SessionStage, TeardownReason, TeardownReport};
