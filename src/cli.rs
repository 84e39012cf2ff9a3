///
/// This module implements the CLI interface for theme-sync: command parsing,
/// settings file edits, progress output and the final report.
///
/// All pipeline logic (sync, index parsing, installation, catalog) lives in the
/// [`theme-sync-core`] crate. This module is strictly CLI glue.
///
/// ## How To Use
/// - For command-line users: use the installed `theme-sync` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`theme-sync-core`]: ../../theme-sync-core/
use crate::load_config::{default_config_path, load_config, save_config, ClientConfig};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use theme_sync_core::catalog::Catalog;
use theme_sync_core::contract::TargetValidator;
use theme_sync_core::manifest::Category;
use theme_sync_core::progress::{ProgressEvent, ProgressSink};
use theme_sync_core::render::HtmlDocumentRenderer;
use theme_sync_core::synchronise::{BatchReport, ThemeInstaller};
use theme_sync_core::target::{might_contain_program, ProgramDirValidator};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// CLI for theme-sync: install theme packages from provider repositories.
#[derive(Parser)]
#[clap(
    name = "theme-sync",
    version,
    about = "Sync theme provider repositories and install their themes"
)]
pub struct Cli {
    /// Path to the YAML settings file (default: ~/.theme_provider_client/theme_provider_config.yml)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync every provider and install all of their themes
    InstallAll,
    /// Sync one provider and install its themes
    InstallProvider { provider_id: String },
    /// Install a single theme from an already synced provider
    Install { provider_id: String, theme_id: String },
    /// List themes of synced providers
    ListThemes {
        /// light, dark or other
        #[clap(long)]
        category: Option<Category>,
        #[clap(long)]
        json: bool,
    },
    /// List synced providers
    ListProviders {
        #[clap(long)]
        json: bool,
    },
    /// Re-sync every provider without installing
    Update,
    /// Register a provider repository ("owner/name")
    AddProvider { id: String, repository: String },
    /// Unregister a provider
    RemoveProvider { id: String },
    /// Select the directory containing the program jar
    SetProgramDir { dir: PathBuf },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = load_config(&config_path)?;
    let installer = ThemeInstaller::default();

    match cli.command {
        Commands::InstallAll => {
            tracing::info!(command = "install-all", "Starting theme installation");
            let (sink, rx) = ProgressSink::channel();
            let printer = print_progress(rx);
            let report = installer
                .install_all(config.snapshot(), sink)
                .await
                .context("Theme installation task failed")?;
            printer.await.ok();
            print_report(&report);
            if !report.success {
                bail!(report.message);
            }
            Ok(())
        }
        Commands::InstallProvider { provider_id } => {
            tracing::info!(command = "install-provider", provider_id = %provider_id, "Installing provider");
            let (sink, rx) = ProgressSink::channel();
            let printer = print_progress(rx);
            let result = installer
                .install_configured_provider(&config.snapshot(), &provider_id, &sink)
                .await;
            drop(sink);
            printer.await.ok();
            let result = result?;
            println!("{}", result.message);
            for failure in &result.failed {
                println!("  failed {}: {}", failure.theme_id, failure.reason);
            }
            for warning in &result.warnings {
                println!("  warning: {warning}");
            }
            if let Some(failure) = &result.failure {
                bail!("Provider {provider_id} failed: {failure:?}");
            }
            Ok(())
        }
        Commands::Install {
            provider_id,
            theme_id,
        } => {
            let catalog = open_catalog(&config)?;
            let installed = catalog
                .install(&provider_id, &theme_id)
                .with_context(|| format!("Failed to install {provider_id}/{theme_id}"))?;
            println!("Installed {} -> {}", theme_id, installed.asset.display());
            if let Some(doc) = &installed.document {
                println!("Documentation -> {}", doc.display());
            }
            for warning in &installed.warnings {
                println!("  warning: {warning}");
            }
            Ok(())
        }
        Commands::ListThemes { category, json } => {
            let catalog = open_catalog(&config)?;
            let themes = match category {
                Some(category) => catalog.themes_in_category(category),
                None => catalog.list_themes(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&themes)?);
            } else {
                for theme in &themes {
                    println!(
                        "{}/{}\t{:?}\t{}",
                        theme.provider_id, theme.theme_id, theme.category, theme.display_name
                    );
                }
            }
            Ok(())
        }
        Commands::ListProviders { json } => {
            let catalog = open_catalog(&config)?;
            let providers = catalog.list_providers();
            if json {
                println!("{}", serde_json::to_string_pretty(&providers)?);
            } else {
                for provider in &providers {
                    let badge = if provider.official { " [official]" } else { "" };
                    println!(
                        "{}\t{}\t{} themes{}",
                        provider.provider_id, provider.name, provider.theme_count, badge
                    );
                }
            }
            Ok(())
        }
        Commands::Update => {
            let (sink, rx) = ProgressSink::channel();
            let printer = print_progress(rx);
            let ok = installer.update_all_providers(&config.snapshot(), &sink).await;
            drop(sink);
            printer.await.ok();
            if !ok {
                bail!("Some providers failed to update.");
            }
            println!("Providers updated.");
            Ok(())
        }
        Commands::AddProvider { id, repository } => {
            config.add_provider(&id, &repository)?;
            save_config(&config_path, &config)?;
            println!("Added provider {id} ({repository})");
            Ok(())
        }
        Commands::RemoveProvider { id } => {
            if !config.remove_provider(&id) {
                bail!("Unknown theme provider: {id}");
            }
            save_config(&config_path, &config)?;
            println!("Removed provider {id}");
            Ok(())
        }
        Commands::SetProgramDir { dir } => {
            set_program_dir(&mut config, &dir)?;
            save_config(&config_path, &config)?;
            println!("Program directory set to {}", config.selected_program_dir);
            Ok(())
        }
    }
}

fn open_catalog(config: &ClientConfig) -> Result<Catalog> {
    Ok(Catalog::open(
        config.snapshot(),
        &ProgramDirValidator,
        Arc::new(HtmlDocumentRenderer),
    )?)
}

fn set_program_dir(config: &mut ClientConfig, dir: &Path) -> Result<()> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Directory does not exist: {}", dir.display()))?;
    if let Err(e) = ProgramDirValidator.validate(&dir) {
        if might_contain_program(&dir) {
            bail!("Invalid program directory: {e} (found files that look related; is the jar renamed?)");
        }
        bail!("Invalid program directory: {e}");
    }
    config.set_program_dir(&dir);
    Ok(())
}

/// Progress goes to stderr so stdout only carries results.
fn print_progress(mut rx: UnboundedReceiver<ProgressEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            eprintln!("[{:>3.0}%] {}", event.fraction * 100.0, event.label);
        }
    })
}

fn print_report(report: &BatchReport) {
    println!("{}", report.message);
    for provider in report.failed_providers() {
        println!("  provider {} failed: {}", provider.provider_id, provider.message);
    }
    for failure in report.theme_failures() {
        println!(
            "  failed {}/{}: {}",
            failure.provider_id, failure.theme_id, failure.reason
        );
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
}
