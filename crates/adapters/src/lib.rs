//! labkit adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `git`: source-control state through the `git` executable
//! - `progress`: terminal progress bar over any iterator

mod git;
mod progress_term;

/// Re-exports for source-control adapters
pub mod source_control {
    pub use crate::git::{DEFAULT_TIMEOUT_SECS, GitCommand, StaticSourceControl};
}

/// Re-exports for progress output
pub mod progress {
    pub use crate::progress_term::{ProgressBar, ProgressError, ProgressIteratorExt};
}
