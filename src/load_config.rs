/// `load_config` module: reads and writes the client's YAML settings file and turns it
/// into the immutable [`ConfigSnapshot`] the core pipeline works from.
///
/// This is the only place where the settings file is parsed or written.
///
/// # Responsibilities
/// - Locate the default settings file under the user's home directory
/// - Parse it into [`ClientConfig`], falling back to defaults for a missing or empty file
/// - Apply edits (providers, program directory) and write them back
/// - Produce a [`ConfigSnapshot`] at the start of every operation
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich diagnostics, and are
/// surfaced at the CLI boundary.
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use theme_sync_core::config::{ConfigSnapshot, ProviderRef};
use theme_sync_core::download::validate_locator;
use tracing::{error, info, warn};

pub const CONFIG_DIR_NAME: &str = ".theme_provider_client";
pub const CONFIG_FILE_NAME: &str = "theme_provider_config.yml";
pub const DEFAULT_PROVIDER_ID: &str = "official_ivan";
pub const DEFAULT_PROVIDER_REPOSITORY: &str = "Ivan951236/PeggleRoguelikeThemes";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Empty when no program directory has been chosen.
    #[serde(default)]
    pub selected_program_dir: String,
    /// Provider id → "owner/name", in registration order.
    #[serde(default = "default_providers")]
    pub installed_theme_providers: Mapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers_root: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub dark_mode: bool,
    #[serde(default = "default_true")]
    pub auto_update_themes: bool,
}

fn default_true() -> bool {
    true
}

fn default_providers() -> Mapping {
    let mut providers = Mapping::new();
    providers.insert(
        Value::from(DEFAULT_PROVIDER_ID),
        Value::from(DEFAULT_PROVIDER_REPOSITORY),
    );
    providers
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            selected_program_dir: String::new(),
            installed_theme_providers: default_providers(),
            providers_root: None,
            dark_mode: true,
            auto_update_themes: true,
        }
    }
}

impl ClientConfig {
    /// Registered providers in configuration order. Entries that are not
    /// string pairs are skipped.
    pub fn providers(&self) -> Vec<ProviderRef> {
        self.installed_theme_providers
            .iter()
            .filter_map(|(id, repository)| match (id.as_str(), repository.as_str()) {
                (Some(id), Some(repository)) => Some(ProviderRef::new(id, repository)),
                _ => {
                    warn!(id = ?id, repository = ?repository, "Ignoring malformed provider entry");
                    None
                }
            })
            .collect()
    }

    /// Register or replace a provider. The repository must be in "owner/name" form.
    pub fn add_provider(&mut self, id: &str, repository: &str) -> Result<()> {
        let id = id.trim();
        let repository = repository.trim();
        if id.is_empty() {
            bail!("Provider id must not be empty");
        }
        if validate_locator(repository).is_err() {
            bail!("Repository name must be in format 'owner/name', got {repository:?}");
        }
        if self
            .installed_theme_providers
            .insert(Value::from(id), Value::from(repository))
            .is_some()
        {
            info!(provider_id = id, repository, "Replaced theme provider");
        } else {
            info!(provider_id = id, repository, "Added theme provider");
        }
        Ok(())
    }

    /// True when a provider was removed.
    pub fn remove_provider(&mut self, id: &str) -> bool {
        let removed = self.installed_theme_providers.remove(id).is_some();
        if removed {
            info!(provider_id = id, "Removed theme provider");
        }
        removed
    }

    pub fn set_program_dir(&mut self, dir: &Path) {
        self.selected_program_dir = dir.to_string_lossy().into_owned();
        info!(program_dir = %dir.display(), "Program directory selected");
    }

    /// Immutable view handed to the core for one operation.
    pub fn snapshot(&self) -> ConfigSnapshot {
        let program_dir = self.selected_program_dir.trim();
        ConfigSnapshot {
            program_dir: (!program_dir.is_empty()).then(|| PathBuf::from(program_dir)),
            providers: self.providers(),
            providers_root: self.providers_root.clone(),
            dark_mode: self.dark_mode,
        }
    }
}

/// `<home>/.theme_provider_client/theme_provider_config.yml`
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine the home directory")?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Loads the settings file. A missing or empty file yields the defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    if !path_ref.exists() {
        info!(config_path = ?path_ref, "Config file not found, using defaults");
        return Ok(ClientConfig::default());
    }

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: Option<ClientConfig> = match serde_yaml::from_str(&config_content) {
        Ok(conf) => conf,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let config = config.unwrap_or_default();
    info!(
        config_path = ?path_ref,
        providers = config.installed_theme_providers.len(),
        program_dir_selected = !config.selected_program_dir.is_empty(),
        "Parsed config YAML successfully"
    );
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &ClientConfig) -> Result<()> {
    let path_ref = path.as_ref();
    if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialise config")?;
    fs::write(path_ref, yaml)
        .with_context(|| format!("Failed to write config file {}", path_ref.display()))?;
    info!(config_path = ?path_ref, "Configuration saved");
    Ok(())
}
