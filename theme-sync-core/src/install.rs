//! Theme installation: one theme, and every theme of one provider.
//!
//! # Responsibilities
//! - [`install_theme`] copies a theme file into the destination directory and
//!   renders its documentation next to it. Documentation and legacy image
//!   directories are best effort: their failures become warnings on a
//!   successful [`ThemeInstall`].
//! - [`install_provider`] syncs a provider repository, validates its index and
//!   installs every entry. A failing entry never stops the remaining ones; a
//!   failing sync or index fails the provider as a whole.
//!
//! # Progress
//! A provider's sink is split into the sync step (`0.0..0.3`), index parsing
//! (`0.3`) and one equal slice of the remaining `0.7` per theme.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::ProviderRef;
use crate::contract::{MarkdownRenderer, RepositorySync};
use crate::error::{AssetError, RenderError};
use crate::manifest::{load_manifest, Manifest, ThemeEntry};
use crate::progress::ProgressSink;
use crate::render::render_file;

const SYNC_BAND_END: f64 = 0.3;
pub const IMAGES_DIR: &str = "images";

/// Collaborators and locations shared by every install in one run.
#[derive(Clone, Copy)]
pub struct InstallContext<'a> {
    pub sync: &'a dyn RepositorySync,
    pub renderer: &'a dyn MarkdownRenderer,
    pub providers_root: &'a Path,
    pub destination_dir: &'a Path,
    pub dark_mode: bool,
}

/// A theme that was installed, plus whatever side output went wrong.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeInstall {
    pub theme_id: String,
    pub asset: PathBuf,
    pub document: Option<PathBuf>,
    pub images: Option<PathBuf>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeFailure {
    pub provider_id: String,
    pub theme_id: String,
    pub reason: String,
}

/// Why a provider as a whole could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum ProviderFailure {
    Sync(String),
    Manifest(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResult {
    pub provider_id: String,
    pub repository: String,
    pub message: String,
    /// Set when the provider failed before any theme was attempted.
    pub failure: Option<ProviderFailure>,
    pub installed: Vec<String>,
    pub failed: Vec<ThemeFailure>,
    pub warnings: Vec<String>,
}

impl ProviderResult {
    fn provider_failed(provider: &ProviderRef, failure: ProviderFailure, message: String) -> Self {
        Self {
            provider_id: provider.id.clone(),
            repository: provider.repository.clone(),
            message,
            failure: Some(failure),
            installed: Vec::new(),
            failed: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Install one theme entry from `provider_root` into `destination_dir`.
///
/// Re-running with unchanged sources rewrites identical files.
pub fn install_theme(
    theme_id: &str,
    entry: &ThemeEntry,
    provider_root: &Path,
    destination_dir: &Path,
    renderer: &dyn MarkdownRenderer,
    dark_mode: bool,
) -> Result<ThemeInstall, AssetError> {
    let asset_path = entry
        .asset_path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| {
            warn!(theme_id, "Theme has no theme path specified");
            AssetError::NoAssetPath(theme_id.to_string())
        })?;

    let source = resolve_relative(provider_root, asset_path).ok_or_else(|| {
        warn!(theme_id, asset_path, "Theme path escapes provider directory");
        AssetError::OutsideProvider(asset_path.to_string())
    })?;
    if !source.is_file() {
        warn!(theme_id, path = %source.display(), "Theme file does not exist");
        return Err(AssetError::SourceMissing(source));
    }
    let Some(file_name) = source.file_name() else {
        return Err(AssetError::SourceMissing(source.clone()));
    };
    let destination = destination_dir.join(file_name);

    fs::create_dir_all(destination_dir)
        .and_then(|_| fs::copy(&source, &destination))
        .map_err(|e| {
            error!(error = ?e, theme_id, from = %source.display(), to = %destination.display(), "Failed to copy theme file");
            AssetError::Copy {
                from: source.clone(),
                to: destination.clone(),
                source: e,
            }
        })?;
    debug!(from = %source.display(), to = %destination.display(), "Copied theme file");

    let mut warnings = Vec::new();

    let document = match render_documentation(theme_id, entry, provider_root, &destination, renderer, dark_mode) {
        Ok(document) => document,
        Err(e) => {
            warn!(error = %e, theme_id, "Documentation render failed, theme still installed");
            warnings.push(format!("{theme_id}: {e}"));
            None
        }
    };

    let images = match &entry.images_dir {
        Some(images_dir) => match copy_legacy_images(theme_id, images_dir, provider_root, destination_dir) {
            Ok(images) => images,
            Err(reason) => {
                warn!(theme_id, images_dir, reason = %reason, "Failed to copy images directory");
                warnings.push(format!("{theme_id}: {reason}"));
                None
            }
        },
        None => None,
    };

    info!(theme_id, asset = %destination.display(), "Installed theme");
    Ok(ThemeInstall {
        theme_id: theme_id.to_string(),
        asset: destination,
        document,
        images,
        warnings,
    })
}

/// Render `entry.doc_path` to `<asset stem>.html` beside the installed asset.
///
/// `Ok(None)` when the entry has no documentation file.
fn render_documentation(
    theme_id: &str,
    entry: &ThemeEntry,
    provider_root: &Path,
    installed_asset: &Path,
    renderer: &dyn MarkdownRenderer,
    dark_mode: bool,
) -> Result<Option<PathBuf>, RenderError> {
    let Some(doc_path) = entry.doc_path.as_deref() else {
        return Ok(None);
    };
    let Some(source) = resolve_relative(provider_root, doc_path).filter(|p| p.is_file()) else {
        debug!(theme_id, doc_path, "Documentation file not found, skipping render");
        return Ok(None);
    };

    let html = render_file(renderer, &source, entry.display_name_or(theme_id), dark_mode)?;

    let stem = installed_asset
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| theme_id.to_string());
    let target = installed_asset.with_file_name(format!("{stem}.html"));
    fs::write(&target, html).map_err(|e| RenderError::Write {
        path: target.clone(),
        source: e,
    })?;
    debug!(from = %source.display(), to = %target.display(), "Rendered theme documentation");
    Ok(Some(target))
}

fn copy_legacy_images(
    theme_id: &str,
    images_dir: &str,
    provider_root: &Path,
    destination_dir: &Path,
) -> Result<Option<PathBuf>, String> {
    let Some(source) = resolve_relative(provider_root, images_dir) else {
        return Err(format!("images directory escapes provider: {images_dir}"));
    };
    if !source.is_dir() {
        debug!(theme_id, path = %source.display(), "Images directory absent, skipping");
        return Ok(None);
    }
    let Some(target) = resolve_relative(&destination_dir.join(IMAGES_DIR), theme_id)
        .filter(|_| Path::new(theme_id).components().count() == 1)
    else {
        return Err(format!("theme id is not a valid directory name: {theme_id}"));
    };
    let copied = copy_dir_recursive(&source, &target).map_err(|e| e.to_string())?;
    debug!(theme_id, files = copied, to = %target.display(), "Copied images directory");
    Ok(Some(target))
}

fn copy_dir_recursive(from: &Path, to: &Path) -> io::Result<usize> {
    fs::create_dir_all(to)?;
    let mut copied = 0;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        let target = to.join(entry.file_name());
        if path.is_dir() {
            copied += copy_dir_recursive(&path, &target)?;
        } else {
            fs::copy(&path, &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Join a manifest-relative path onto `root`, refusing anything that could leave it.
pub fn resolve_relative(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative.trim());
    if relative.as_os_str().is_empty() {
        return None;
    }
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

/// Sync one provider, validate its index and install all of its themes.
pub async fn install_provider(
    ctx: &InstallContext<'_>,
    provider: &ProviderRef,
    progress: &ProgressSink,
) -> ProviderResult {
    let repository = provider.repository.as_str();
    info!(provider_id = %provider.id, repository, "Installing themes from provider");

    progress.report(format!("Cloning/updating {repository}"), 0.0);
    let sync_progress = progress.scoped(0.0, SYNC_BAND_END);
    let provider_dir = match ctx
        .sync
        .sync(repository, ctx.providers_root, &sync_progress)
        .await
    {
        Ok(dir) => dir,
        Err(e) => {
            error!(provider_id = %provider.id, error = %e, "Provider sync failed");
            progress.report(format!("Failed to clone repository: {repository}"), 1.0);
            return ProviderResult::provider_failed(
                provider,
                ProviderFailure::Sync(e.to_string()),
                format!("Failed to clone repository: {repository}"),
            );
        }
    };

    progress.report("Parsing theme index", SYNC_BAND_END);
    let manifest = match load_manifest(&provider_dir).and_then(Manifest::validate) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!(provider_id = %provider.id, error = %e, "Provider index rejected");
            progress.report(format!("Invalid index.yml in {repository}"), 1.0);
            return ProviderResult::provider_failed(
                provider,
                ProviderFailure::Manifest(e.to_string()),
                format!("Failed to parse index.yml from: {repository}"),
            );
        }
    };

    let total = manifest.themes.len();
    let mut installed = Vec::with_capacity(total);
    let mut failed = Vec::new();
    let mut warnings = Vec::new();

    for (position, (theme_id, entry)) in manifest.themes.iter().enumerate() {
        let fraction = SYNC_BAND_END + (1.0 - SYNC_BAND_END) * position as f64 / total as f64;
        progress.report(format!("Installing theme: {theme_id}"), fraction);

        match install_theme(
            theme_id,
            entry,
            &provider_dir,
            ctx.destination_dir,
            ctx.renderer,
            ctx.dark_mode,
        ) {
            Ok(done) => {
                warnings.extend(done.warnings);
                installed.push(theme_id.clone());
            }
            Err(e) => {
                warn!(provider_id = %provider.id, theme_id = %theme_id, error = %e, "Failed to install theme");
                failed.push(ThemeFailure {
                    provider_id: provider.id.clone(),
                    theme_id: theme_id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    progress.report(format!("Provider {} processed", provider.id), 1.0);
    info!(
        provider_id = %provider.id,
        installed = installed.len(),
        failed = failed.len(),
        "Provider themes processed"
    );

    ProviderResult {
        provider_id: provider.id.clone(),
        repository: provider.repository.clone(),
        message: format!(
            "Provider themes processed: {} installed, {} failed",
            installed.len(),
            failed.len()
        ),
        failure: None,
        installed,
        failed,
        warnings,
    }
}
