// Library exports for the binary, integration tests and presentation layers

pub mod analysis;
pub mod cloud_storage;
pub mod config;
pub mod error;
pub mod export;
pub mod grouping;
pub mod models;
pub mod preview_registry;
pub mod progress;
pub mod selection;
pub mod session;
pub mod sources;
pub mod upload;

// Re-export the session entry points at crate root for easier access
pub use error::{ErrorStage, SessionError};
pub use session::{
    PhotoSelection, SessionManager, SessionServices, SessionStage, TeardownReason, TeardownReport,
};
