//! Error taxonomy for the install pipeline.
//!
//! Each enum matches one failure class and one blast radius:
//! - [`ConfigurationError`] fails the requested operation before any I/O.
//! - [`SyncError`] and [`ManifestError`] fail one provider.
//! - [`AssetError`] fails one theme.
//! - [`RenderError`] is only ever a warning attached to a successful theme install.
//!
//! Components convert these into result values at their boundary
//! (`ThemeInstall`, `ProviderResult`, `BatchReport`); none of them escape as panics.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
pub enum ConfigurationError {
    #[error("No program directory selected")]
    NoProgramDirectory,

    #[error("No theme providers configured")]
    NoProviders,

    #[error("Invalid program directory: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("Unknown theme provider: {0}")]
    UnknownProvider(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Repository locator must be in format 'owner/name': {0:?}")]
    InvalidLocator(String),

    #[error("Failed to launch git: {0}")]
    Launch(#[source] std::io::Error),

    #[error("git {operation} for {repository} exited with {status}")]
    GitFailed {
        operation: &'static str,
        repository: String,
        status: String,
    },

    #[error("Repository directory is not usable: {0}")]
    NotARepository(PathBuf),

    #[error("IO error while syncing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("index.yml not found in: {0}")]
    Missing(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest: {0}")]
    Malformed(String),

    #[error("Manifest does not declare a theme_provider")]
    Unverified,
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Theme {0} has no theme path specified")]
    NoAssetPath(String),

    #[error("Theme {theme_id} not found in provider {provider_id}")]
    NotInCatalog { provider_id: String, theme_id: String },

    #[error("Theme path escapes the provider directory: {0}")]
    OutsideProvider(String),

    #[error("Theme file does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("Failed to copy {from} -> {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to read markdown {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write rendered document {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Markdown rendering failed: {0}")]
    Render(String),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
pub enum TargetError {
    #[error("Directory does not exist or is not a directory")]
    NotADirectory,

    #[error("No JAR file found starting with '{0}'")]
    ProgramNotFound(&'static str),

    #[error("{0} exists but is not a directory")]
    NotADirectoryEntry(&'static str),

    #[error("{0} directory does not exist and cannot be created")]
    CannotCreate(&'static str),

    #[error("Error reading directory: {0}")]
    Unreadable(String),
}
