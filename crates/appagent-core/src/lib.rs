//! AppAgent Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Process spawning
//! - Filesystem access
//! - Runtime specifics
//!
//! The runner crate consumes these types; display layers receive them.

pub mod error;
pub mod ids;
pub mod message;
pub mod request;
pub mod result;
pub mod status;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::RunId;
pub use request::TaskRequest;
pub use result::ExecutionResult;
pub use status::RunOutcome;
