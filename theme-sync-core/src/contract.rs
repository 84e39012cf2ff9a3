//! # contract: seams between the install pipeline and its collaborators
//!
//! The pipeline itself only parses indexes, copies files and aggregates results.
//! Everything else is reached through the traits in this module:
//! - [`RepositorySync`]: clone-or-update one provider repository.
//! - [`MarkdownRenderer`]: turn theme documentation into an HTML document.
//! - [`TargetValidator`]: check a program directory and resolve where themes go.
//!
//! ## Mocking & Testing
//! - The traits are annotated for `mockall`, so tests can script collaborators
//!   without touching git or the filesystem layout of a real installation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{RenderError, SyncError, TargetError};
use crate::progress::ProgressSink;

/// Fetches provider repositories.
///
/// Contract:
/// - if `<destination_root>/<last segment of locator>` exists, update it in
///   place; diverged history is a failure, never a reset;
/// - otherwise clone into that directory, removing whatever was partially
///   written if the clone fails.
///
/// Progress goes to `progress` (a sink already scoped to the sync step).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositorySync: Send + Sync {
    /// Returns the local repository directory on success.
    async fn sync(
        &self,
        repository: &str,
        destination_root: &Path,
        progress: &ProgressSink,
    ) -> Result<PathBuf, SyncError>;
}

/// Renders markdown text to a standalone HTML document.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait MarkdownRenderer: Send + Sync {
    /// `base_path` is the directory relative links and images resolve against.
    fn render(
        &self,
        markdown: &str,
        title: &str,
        dark_mode: bool,
        base_path: &Path,
    ) -> Result<String, RenderError>;
}

/// Paths resolved from a validated program directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    pub program_dir: PathBuf,
    pub program_file: PathBuf,
    /// Where installed theme assets go.
    pub destination_dir: PathBuf,
    /// Where provider repositories are synced to.
    pub providers_root: PathBuf,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait TargetValidator: Send + Sync {
    fn validate(&self, program_dir: &Path) -> Result<TargetLayout, TargetError>;
}
