//! Validation of the host program directory and the paths derived from it.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::contract::{TargetLayout, TargetValidator};
use crate::error::TargetError;

pub const PROGRAM_FILE_PREFIX: &str = "peggle-roguelike-generator";
pub const PROGRAM_FILE_EXTENSION: &str = ".jar";
pub const CUSTOM_THEMES_DIR: &str = "customThemes";
pub const THEME_PROVIDERS_DIR: &str = "themeProviders";

/// Accepts a directory holding the program jar, creating `customThemes/` and
/// `themeProviders/` next to it when they are missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgramDirValidator;

impl TargetValidator for ProgramDirValidator {
    fn validate(&self, program_dir: &Path) -> Result<TargetLayout, TargetError> {
        if !program_dir.is_dir() {
            return Err(TargetError::NotADirectory);
        }

        let mut jars: Vec<_> = fs::read_dir(program_dir)
            .map_err(|e| TargetError::Unreadable(e.to_string()))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_lowercase)
                    .is_some_and(|name| {
                        name.starts_with(PROGRAM_FILE_PREFIX) && name.ends_with(PROGRAM_FILE_EXTENSION)
                    })
            })
            .collect();
        jars.sort();

        let Some(program_file) = jars.first().cloned() else {
            return Err(TargetError::ProgramNotFound(PROGRAM_FILE_PREFIX));
        };
        if jars.len() > 1 {
            warn!(
                chosen = %program_file.display(),
                count = jars.len(),
                "Multiple program jars found, using the first one"
            );
        }

        let destination_dir = ensure_dir(program_dir, CUSTOM_THEMES_DIR)?;
        let providers_root = ensure_dir(program_dir, THEME_PROVIDERS_DIR)?;

        info!(
            program_dir = %program_dir.display(),
            program_file = %program_file.display(),
            "Program directory validation successful"
        );
        Ok(TargetLayout {
            program_dir: program_dir.to_path_buf(),
            program_file,
            destination_dir,
            providers_root,
        })
    }
}

fn ensure_dir(parent: &Path, name: &'static str) -> Result<std::path::PathBuf, TargetError> {
    let dir = parent.join(name);
    if !dir.exists() {
        fs::create_dir(&dir).map_err(|e| {
            warn!(error = ?e, path = %dir.display(), "Failed to create directory");
            TargetError::CannotCreate(name)
        })?;
        info!(path = %dir.display(), "Created missing directory");
    }
    if !dir.is_dir() {
        return Err(TargetError::NotADirectoryEntry(name));
    }
    Ok(dir)
}

/// Loose check used for suggestions: any file that mentions the program by name.
pub fn might_contain_program(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .any(|e| {
            let name = e.file_name().to_string_lossy().to_lowercase();
            name.contains("peggle") || name.contains("roguelike")
        })
}
