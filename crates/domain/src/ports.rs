//! Port definitions (traits) for external dependencies
//!
//! Adapters implement these traits to connect to real infrastructure.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::GitState;

/// Error type for source-control queries
#[derive(Debug, Error)]
pub enum SourceControlError {
    #[error("Failed to run {command}: {message}")]
    Command { command: String, message: String },
    #[error("{command} timed out")]
    Timeout { command: String },
    #[error("Invalid output from {command}: {message}")]
    InvalidOutput { command: String, message: String },
}

/// Port for reading the state of the working tree
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Describe the repository containing `root`
    ///
    /// Returns `None` when `root` is not inside a repository. Paths matching
    /// `excludes` (pathspecs) are left out of the patch.
    async fn reproduce(
        &self,
        root: &Path,
        excludes: &[String],
    ) -> Result<Option<GitState>, SourceControlError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
