use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// A registered theme provider: a local key and the repository it is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRef {
    pub id: String,
    /// Repository in "owner/name" form.
    pub repository: String,
}

impl ProviderRef {
    pub fn new(id: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repository: repository.into(),
        }
    }

    /// Name of the directory the repository is synced into.
    pub fn local_name(&self) -> &str {
        repository_dir_name(&self.repository)
    }
}

/// Last path segment of a repository locator ("owner/name" -> "name").
pub fn repository_dir_name(locator: &str) -> &str {
    let trimmed = locator.trim().trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Immutable view of the client configuration, taken when an operation starts.
///
/// Edits made to the live configuration while an operation runs are not seen
/// by that operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Directory containing the host program; `None` when nothing is selected.
    pub program_dir: Option<PathBuf>,
    /// Configured providers, in configuration order.
    pub providers: Vec<ProviderRef>,
    /// Overrides where provider repositories are stored.
    pub providers_root: Option<PathBuf>,
    pub dark_mode: bool,
}

impl ConfigSnapshot {
    pub fn selected_program_dir(&self) -> Option<&PathBuf> {
        self.program_dir
            .as_ref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderRef> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn trace_loaded(&self) {
        info!(
            program_dir = ?self.program_dir,
            providers_count = self.providers.len(),
            "Loaded config snapshot"
        );
        debug!(snapshot = ?self, "Config snapshot (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_name_is_last_segment() {
        assert_eq!(ProviderRef::new("a", "Ivan951236/PeggleRoguelikeThemes").local_name(), "PeggleRoguelikeThemes");
        assert_eq!(repository_dir_name("owner/name/"), "name");
        assert_eq!(repository_dir_name("plain"), "plain");
    }

    #[test]
    fn empty_program_dir_counts_as_unselected() {
        let snapshot = ConfigSnapshot {
            program_dir: Some(PathBuf::new()),
            ..Default::default()
        };
        assert!(snapshot.selected_program_dir().is_none());
    }
}
