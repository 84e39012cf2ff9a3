//! Read-only view over providers that are already synced.
//!
//! Nothing here clones or pulls. A provider without a local directory, or with
//! an index that does not parse or does not name its provider, is left out of
//! every listing.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ConfigSnapshot, ProviderRef};
use crate::contract::{MarkdownRenderer, TargetValidator};
use crate::download::validate_locator;
use crate::error::{AssetError, ConfigurationError};
use crate::install::{install_theme, resolve_relative, ThemeInstall};
use crate::manifest::{load_manifest, Category, Manifest};
use crate::render::render_file;
use crate::synchronise::{resolve_target, ResolvedTarget};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeSummary {
    pub provider_id: String,
    pub theme_id: String,
    pub display_name: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub has_documentation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSummary {
    pub provider_id: String,
    pub repository: String,
    pub name: String,
    pub description: Option<String>,
    pub official: bool,
    pub certified: bool,
    pub tags: Vec<String>,
    pub nsfw: bool,
    pub date_created: Option<NaiveDate>,
    pub theme_count: usize,
    pub icon: Option<PathBuf>,
    pub local_dir: PathBuf,
}

struct LoadedProvider<'a> {
    provider: &'a ProviderRef,
    dir: PathBuf,
    manifest: Manifest,
}

pub struct Catalog {
    config: ConfigSnapshot,
    target: ResolvedTarget,
    renderer: Arc<dyn MarkdownRenderer>,
}

impl Catalog {
    /// Resolve locations from the snapshot's program directory.
    pub fn open(
        config: ConfigSnapshot,
        validator: &dyn TargetValidator,
        renderer: Arc<dyn MarkdownRenderer>,
    ) -> Result<Self, ConfigurationError> {
        let target = resolve_target(validator, &config)?;
        Ok(Self::at(config, target, renderer))
    }

    pub fn at(config: ConfigSnapshot, target: ResolvedTarget, renderer: Arc<dyn MarkdownRenderer>) -> Self {
        Self {
            config,
            target,
            renderer,
        }
    }

    fn load(&self, provider: &ProviderRef) -> Option<Manifest> {
        if validate_locator(&provider.repository).is_err() {
            debug!(provider_id = %provider.id, repository = %provider.repository, "Invalid repository locator, skipping");
            return None;
        }
        let dir = self.target.providers_root.join(provider.local_name());
        if !dir.is_dir() {
            debug!(provider_id = %provider.id, path = %dir.display(), "Provider not synced, skipping");
            return None;
        }
        match load_manifest(&dir).and_then(Manifest::validate) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                debug!(provider_id = %provider.id, error = %e, "Provider index unusable, skipping");
                None
            }
        }
    }

    fn loaded(&self) -> impl Iterator<Item = LoadedProvider<'_>> {
        self.config.providers.iter().filter_map(|provider| {
            self.load(provider).map(|manifest| LoadedProvider {
                provider,
                dir: self.target.providers_root.join(provider.local_name()),
                manifest,
            })
        })
    }

    fn loaded_by_id(&self, provider_id: &str) -> Option<LoadedProvider<'_>> {
        self.loaded().find(|p| p.provider.id == provider_id)
    }

    pub fn list_providers(&self) -> Vec<ProviderSummary> {
        self.loaded()
            .map(|loaded| {
                let m = &loaded.manifest;
                ProviderSummary {
                    provider_id: loaded.provider.id.clone(),
                    repository: loaded.provider.repository.clone(),
                    name: m.display_name().unwrap_or(&loaded.provider.id).to_string(),
                    description: m.description.clone(),
                    official: m.is_official(),
                    certified: m.certified,
                    tags: m.tags(),
                    nsfw: m.has_nsfw_content(),
                    date_created: m.parsed_date_created(),
                    theme_count: m.themes.len(),
                    icon: m
                        .icon
                        .as_deref()
                        .and_then(|icon| resolve_relative(&loaded.dir, icon))
                        .filter(|p| p.is_file()),
                    local_dir: loaded.dir.clone(),
                }
            })
            .collect()
    }

    pub fn list_themes(&self) -> Vec<ThemeSummary> {
        self.loaded()
            .flat_map(|loaded| {
                let provider_id = loaded.provider.id.clone();
                loaded
                    .manifest
                    .themes
                    .into_iter()
                    .map(move |(theme_id, entry)| ThemeSummary {
                        provider_id: provider_id.clone(),
                        display_name: entry.display_name_or(&theme_id).to_string(),
                        category: entry.kind(),
                        tags: entry.tags.clone(),
                        has_documentation: entry.doc_path.is_some(),
                        theme_id,
                    })
            })
            .collect()
    }

    pub fn themes_in_category(&self, category: Category) -> Vec<ThemeSummary> {
        self.list_themes()
            .into_iter()
            .filter(|t| t.category == category)
            .collect()
    }

    /// The provider's homepage document as HTML, if it has one.
    pub fn render_provider_home(&self, provider_id: &str) -> Option<String> {
        let loaded = self.loaded_by_id(provider_id)?;
        let page = resolve_relative(&loaded.dir, loaded.manifest.homepage.as_deref()?)?;
        if !page.is_file() {
            debug!(provider_id, path = %page.display(), "Homepage file missing");
            return None;
        }
        let title = loaded.manifest.display_name().unwrap_or(provider_id);
        render_file(self.renderer.as_ref(), &page, title, self.config.dark_mode)
            .map_err(|e| warn!(provider_id, error = %e, "Failed to render provider homepage"))
            .ok()
    }

    /// A theme's documentation as HTML, if it has any.
    pub fn render_theme_doc(&self, provider_id: &str, theme_id: &str) -> Option<String> {
        let loaded = self.loaded_by_id(provider_id)?;
        let entry = loaded.manifest.themes.get(theme_id)?;
        let doc = resolve_relative(&loaded.dir, entry.doc_path.as_deref()?)?;
        if !doc.is_file() {
            return None;
        }
        render_file(
            self.renderer.as_ref(),
            &doc,
            entry.display_name_or(theme_id),
            self.config.dark_mode,
        )
        .map_err(|e| warn!(provider_id, theme_id, error = %e, "Failed to render theme documentation"))
        .ok()
    }

    /// Install one theme from an already synced provider.
    pub fn install(&self, provider_id: &str, theme_id: &str) -> Result<ThemeInstall, AssetError> {
        let not_found = || AssetError::NotInCatalog {
            provider_id: provider_id.to_string(),
            theme_id: theme_id.to_string(),
        };
        let loaded = self.loaded_by_id(provider_id).ok_or_else(not_found)?;
        let entry = loaded.manifest.themes.get(theme_id).ok_or_else(not_found)?;
        info!(provider_id, theme_id, "Installing single theme");
        install_theme(
            theme_id,
            entry,
            &loaded.dir,
            &self.target.destination_dir,
            self.renderer.as_ref(),
            self.config.dark_mode,
        )
    }

    pub fn install_one(&self, provider_id: &str, theme_id: &str) -> bool {
        match self.install(provider_id, theme_id) {
            Ok(_) => true,
            Err(e) => {
                warn!(provider_id, theme_id, error = %e, "Single theme install failed");
                false
            }
        }
    }
}
