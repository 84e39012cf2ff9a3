//! High-level pipeline: orchestrates sync → parse → install for every configured provider.
//!
//! This module provides the top-level orchestration for installing themes from
//! all providers in a [`ConfigSnapshot`]. A batch:
//!   - Checks the configuration (program directory selected, providers present)
//!     before touching the filesystem
//!   - Validates the program directory through the [`TargetValidator`]
//!   - Runs the provider installer for each provider in configuration order,
//!     giving provider `i` of `N` the progress range `[i/N, (i+1)/N]`
//!   - Merges every provider result into one [`BatchReport`]
//!
//! # Major Types
//! - [`ThemeInstaller`]: owns the collaborators and the worker pool
//! - [`BatchReport`]: installed and failed theme ids plus the per-provider results
//!
//! # Concurrency
//! Batches run on spawned tokio tasks and are bounded by a pool of
//! [`WORKER_POOL_SIZE`] permits. Providers inside one batch run one after the
//! other. There is no cancellation; a batch runs to completion or failure.
//! Concurrent batches writing to the same destination are not guarded here.
//!
//! # Error Handling
//! Configuration problems produce a failed report without I/O. Provider and
//! theme failures are recorded in the report and never stop the batch.
//!
//! # Navigation
//! - Batch entrypoint: [`ThemeInstaller::install_all`]
//! - Single provider: [`ThemeInstaller::install_provider`]
//! - Re-sync only: [`ThemeInstaller::update_all_providers`]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{ConfigSnapshot, ProviderRef};
use crate::contract::{MarkdownRenderer, RepositorySync, TargetValidator};
use crate::download::GitRepositorySync;
use crate::error::ConfigurationError;
use crate::install::{self, InstallContext, ProviderResult, ThemeFailure};
use crate::progress::ProgressSink;
use crate::render::HtmlDocumentRenderer;
use crate::target::ProgramDirValidator;

pub const WORKER_POOL_SIZE: usize = 3;

/// Where a run reads provider repositories from and installs themes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub destination_dir: PathBuf,
    pub providers_root: PathBuf,
}

/// Validate the selected program directory and resolve the run's paths.
///
/// A `providers_root` set in the snapshot overrides the one from the layout.
pub fn resolve_target(
    validator: &dyn TargetValidator,
    config: &ConfigSnapshot,
) -> Result<ResolvedTarget, ConfigurationError> {
    let program_dir = config
        .selected_program_dir()
        .ok_or(ConfigurationError::NoProgramDirectory)?;
    let layout = validator.validate(program_dir)?;
    Ok(ResolvedTarget {
        destination_dir: layout.destination_dir,
        providers_root: config.providers_root.clone().unwrap_or(layout.providers_root),
    })
}

/// Checks that need no I/O.
fn check_batch_config(config: &ConfigSnapshot) -> Result<(), ConfigurationError> {
    if config.selected_program_dir().is_none() {
        return Err(ConfigurationError::NoProgramDirectory);
    }
    if config.providers.is_empty() {
        return Err(ConfigurationError::NoProviders);
    }
    Ok(())
}

/// One theme install attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    pub provider_id: String,
    pub theme_id: String,
    pub succeeded: bool,
}

/// Result of a batch run.
///
/// `installed_ids` and `failed_ids` hold bare theme ids, one per attempt. A
/// theme id offered by two providers can therefore appear twice in one list,
/// or once in each when one attempt succeeds and the other fails. `outcomes`
/// keeps the provider of every attempt and is the exact partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// False only when the batch could not start.
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_error: Option<ConfigurationError>,
    pub installed_ids: Vec<String>,
    pub failed_ids: Vec<String>,
    /// Every attempt, in the order it happened.
    pub outcomes: Vec<InstallOutcome>,
    pub providers: Vec<ProviderResult>,
    pub warnings: Vec<String>,
}

impl BatchReport {
    pub fn configuration_failure(error: ConfigurationError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            configuration_error: Some(error),
            installed_ids: Vec::new(),
            failed_ids: Vec::new(),
            outcomes: Vec::new(),
            providers: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn from_results(providers: Vec<ProviderResult>) -> Self {
        let mut outcomes = Vec::new();
        let mut warnings = Vec::new();
        for result in &providers {
            outcomes.extend(result.installed.iter().map(|theme_id| InstallOutcome {
                provider_id: result.provider_id.clone(),
                theme_id: theme_id.clone(),
                succeeded: true,
            }));
            outcomes.extend(result.failed.iter().map(|f| InstallOutcome {
                provider_id: f.provider_id.clone(),
                theme_id: f.theme_id.clone(),
                succeeded: false,
            }));
            warnings.extend(result.warnings.iter().cloned());
        }

        let (installed, failed): (Vec<_>, Vec<_>) = outcomes.iter().partition(|o| o.succeeded);
        let installed_ids: Vec<String> = installed.into_iter().map(|o| o.theme_id.clone()).collect();
        let failed_ids: Vec<String> = failed.into_iter().map(|o| o.theme_id.clone()).collect();

        Self {
            success: true,
            message: format!(
                "Installation complete. {} themes installed, {} failed.",
                installed_ids.len(),
                failed_ids.len()
            ),
            configuration_error: None,
            installed_ids,
            failed_ids,
            outcomes,
            providers,
            warnings,
        }
    }

    /// Providers that failed before any of their themes were attempted.
    pub fn failed_providers(&self) -> impl Iterator<Item = &ProviderResult> {
        self.providers.iter().filter(|p| !p.is_success())
    }

    pub fn theme_failures(&self) -> impl Iterator<Item = &ThemeFailure> {
        self.providers.iter().flat_map(|p| p.failed.iter())
    }

    /// Started, and nothing at all failed.
    pub fn is_clean(&self) -> bool {
        self.success && self.failed_ids.is_empty() && self.failed_providers().next().is_none()
    }
}

/// Installs themes from configured providers.
///
/// Cheap to clone; clones share collaborators and the worker pool.
#[derive(Clone)]
pub struct ThemeInstaller {
    sync: Arc<dyn RepositorySync>,
    renderer: Arc<dyn MarkdownRenderer>,
    validator: Arc<dyn TargetValidator>,
    workers: Arc<Semaphore>,
}

impl Default for ThemeInstaller {
    fn default() -> Self {
        Self::new(
            Arc::new(GitRepositorySync::new()),
            Arc::new(HtmlDocumentRenderer),
            Arc::new(ProgramDirValidator),
        )
    }
}

impl ThemeInstaller {
    pub fn new(
        sync: Arc<dyn RepositorySync>,
        renderer: Arc<dyn MarkdownRenderer>,
        validator: Arc<dyn TargetValidator>,
    ) -> Self {
        Self {
            sync,
            renderer,
            validator,
            workers: Arc::new(Semaphore::new(WORKER_POOL_SIZE)),
        }
    }

    /// Start a batch over every provider in `config`.
    ///
    /// The handle resolves to the report; a panic inside the batch surfaces as a
    /// `JoinError`, after all progress up to that point has been delivered.
    pub fn install_all(&self, config: ConfigSnapshot, progress: ProgressSink) -> JoinHandle<BatchReport> {
        let this = self.clone();
        let span = info_span!("batch", run_id = %Uuid::new_v4());
        tokio::spawn(
            async move {
                let _permit = Arc::clone(&this.workers).acquire_owned().await.ok();
                this.run_batch(config, progress).await
            }
            .instrument(span),
        )
    }

    async fn run_batch(&self, config: ConfigSnapshot, progress: ProgressSink) -> BatchReport {
        info!(providers = config.providers.len(), "[BATCH] Starting theme installation");
        config.trace_loaded();

        let target = match check_batch_config(&config)
            .and_then(|_| resolve_target(self.validator.as_ref(), &config))
        {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "[BATCH] Configuration rejected, nothing installed");
                progress.message(e.to_string());
                return BatchReport::configuration_failure(e);
            }
        };

        progress.report("Starting theme installation...", 0.0);
        let ctx = self.context(&target, config.dark_mode);
        let total = config.providers.len() as f64;
        let mut results = Vec::with_capacity(config.providers.len());

        for (index, provider) in config.providers.iter().enumerate() {
            let scoped = progress.scoped(index as f64 / total, (index + 1) as f64 / total);
            scoped.message(format!("Processing provider: {}", provider.id));
            let result = install::install_provider(&ctx, provider, &scoped).await;
            if let Some(failure) = &result.failure {
                error!(provider_id = %provider.id, failure = ?failure, "[BATCH] Provider failed");
            }
            results.push(result);
        }

        let report = BatchReport::from_results(results);
        progress.report(report.message.clone(), 1.0);
        info!(
            installed = report.installed_ids.len(),
            failed = report.failed_ids.len(),
            "[BATCH] {}",
            report.message
        );
        match serde_json::to_string_pretty(&report) {
            Ok(json) => debug!(json = %json, "[BATCH][DEBUG] Batch report as JSON"),
            Err(e) => error!(error = ?e, "[BATCH][DEBUG] Failed to serialize batch report as JSON"),
        }
        report
    }

    /// Sync and install a single provider into explicit locations.
    pub async fn install_provider(
        &self,
        provider: &ProviderRef,
        providers_root: &Path,
        destination_dir: &Path,
        dark_mode: bool,
        progress: &ProgressSink,
    ) -> ProviderResult {
        let _permit = self.workers.acquire().await.ok();
        let target = ResolvedTarget {
            destination_dir: destination_dir.to_path_buf(),
            providers_root: providers_root.to_path_buf(),
        };
        install::install_provider(&self.context(&target, dark_mode), provider, progress).await
    }

    /// Install one configured provider, resolving locations from `config`.
    pub async fn install_configured_provider(
        &self,
        config: &ConfigSnapshot,
        provider_id: &str,
        progress: &ProgressSink,
    ) -> Result<ProviderResult, ConfigurationError> {
        let provider = config
            .provider(provider_id)
            .ok_or_else(|| ConfigurationError::UnknownProvider(provider_id.to_string()))?;
        let target = resolve_target(self.validator.as_ref(), config)?;
        Ok(self
            .install_provider(
                provider,
                &target.providers_root,
                &target.destination_dir,
                config.dark_mode,
                progress,
            )
            .await)
    }

    /// Re-sync every configured provider without installing anything.
    ///
    /// True only when every provider synced.
    pub async fn update_all_providers(&self, config: &ConfigSnapshot, progress: &ProgressSink) -> bool {
        let target = match check_batch_config(config)
            .and_then(|_| resolve_target(self.validator.as_ref(), config))
        {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "[UPDATE] Configuration rejected");
                progress.message(e.to_string());
                return false;
            }
        };
        let _permit = self.workers.acquire().await.ok();

        let total = config.providers.len() as f64;
        let mut all_ok = true;
        for (index, provider) in config.providers.iter().enumerate() {
            let scoped = progress.scoped(index as f64 / total, (index + 1) as f64 / total);
            scoped.report(format!("Updating {}", provider.repository), 0.0);
            match self
                .sync
                .sync(&provider.repository, &target.providers_root, &scoped)
                .await
            {
                Ok(dir) => info!(provider_id = %provider.id, path = %dir.display(), "[UPDATE] Provider updated"),
                Err(e) => {
                    error!(provider_id = %provider.id, error = %e, "[UPDATE] Provider update failed");
                    all_ok = false;
                }
            }
            scoped.report(format!("Updated {}", provider.id), 1.0);
        }
        progress.report(
            if all_ok { "Providers updated." } else { "Some providers failed to update." },
            1.0,
        );
        all_ok
    }

    fn context<'a>(&'a self, target: &'a ResolvedTarget, dark_mode: bool) -> InstallContext<'a> {
        InstallContext {
            sync: self.sync.as_ref(),
            renderer: self.renderer.as_ref(),
            providers_root: &target.providers_root,
            destination_dir: &target.destination_dir,
            dark_mode,
        }
    }
}
