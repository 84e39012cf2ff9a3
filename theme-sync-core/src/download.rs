use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::config::repository_dir_name;
use crate::contract::RepositorySync;
use crate::error::SyncError;
use crate::progress::ProgressSink;

pub const GITHUB_BASE_URL: &str = "https://github.com/";

// "Receiving objects:  45% (450/1000), 1.2 MiB | 3 MiB/s"
static GIT_PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:remote:\s*)?(?P<task>[A-Za-z][A-Za-z ]*?):\s+(?P<pct>\d+)%\s+\((?P<done>\d+)/(?P<total>\d+)\)")
        .expect("valid git progress regex")
});

/// Clones and updates provider repositories with the `git` executable.
///
/// Repositories are addressed as "owner/name" and fetched from
/// `<base_url><owner>/<name>.git`; the base defaults to GitHub.
#[derive(Debug, Clone)]
pub struct GitRepositorySync {
    base_url: String,
}

impl Default for GitRepositorySync {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRepositorySync {
    pub fn new() -> Self {
        Self::with_base_url(GITHUB_BASE_URL)
    }

    /// Use a different host or a local mirror directory as the clone source.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url }
    }

    pub fn clone_url(&self, repository: &str) -> String {
        format!("{}{}.git", self.base_url, repository.trim().trim_end_matches('/'))
    }

    async fn clone_fresh(
        &self,
        repository: &str,
        destination_root: &Path,
        clone_dir: &Path,
        progress: &ProgressSink,
    ) -> Result<PathBuf, SyncError> {
        fs::create_dir_all(destination_root).map_err(|e| {
            tracing::error!(
                error = ?e,
                path = %destination_root.display(),
                "Failed to create provider storage directory"
            );
            SyncError::Io {
                path: destination_root.to_path_buf(),
                source: e,
            }
        })?;

        let url = self.clone_url(repository);
        tracing::info!(repository, url = %url, path = %clone_dir.display(), "Cloning repository");
        progress.message(format!("Cloning {repository}..."));

        let mut command = Command::new("git");
        command.arg("clone").arg("--progress").arg(&url).arg(clone_dir);

        match run_git(command, "clone", repository, progress).await {
            Ok(()) => {
                tracing::info!(
                    repository,
                    path = %clone_dir.display(),
                    "Successfully cloned git repository"
                );
                progress.report(format!("Successfully cloned {repository}"), 1.0);
                Ok(clone_dir.to_path_buf())
            }
            Err(e) => {
                tracing::error!(error = %e, repository, "Failed to clone repository");
                progress.message(format!("Failed to clone {repository}: {e}"));
                if clone_dir.exists() {
                    match fs::remove_dir_all(clone_dir) {
                        Ok(()) => tracing::debug!(
                            path = %clone_dir.display(),
                            "Removed partial clone"
                        ),
                        Err(cleanup) => tracing::warn!(
                            error = ?cleanup,
                            path = %clone_dir.display(),
                            "Failed to clean up partial clone directory"
                        ),
                    }
                }
                Err(e)
            }
        }
    }

    async fn update(
        &self,
        repository: &str,
        clone_dir: &Path,
        progress: &ProgressSink,
    ) -> Result<PathBuf, SyncError> {
        if !is_git_repository(clone_dir) {
            tracing::error!(path = %clone_dir.display(), "Existing directory is not a git repository");
            return Err(SyncError::NotARepository(clone_dir.to_path_buf()));
        }

        let name = repository_dir_name(repository);
        tracing::info!(repository, path = %clone_dir.display(), "Updating repository");
        progress.message(format!("Updating {name}..."));

        // Diverged local history is merged, never reset. A conflict fails the update.
        let mut command = Command::new("git");
        command
            .args(["-c", MERGE_USER_NAME, "-c", MERGE_USER_EMAIL])
            .arg("-C")
            .arg(clone_dir)
            .arg("pull")
            .arg("--no-rebase")
            .arg("--no-edit")
            .arg("--progress");

        match run_git(command, "pull", repository, progress).await {
            Ok(()) => {
                tracing::info!(repository, path = %clone_dir.display(), "Successfully updated repository");
                progress.report(format!("Successfully updated {name}"), 1.0);
                Ok(clone_dir.to_path_buf())
            }
            Err(e) => {
                tracing::error!(error = %e, repository, "Failed to update repository");
                abort_merge(clone_dir).await;
                progress.message(format!("Failed to update repository: {e}"));
                Err(e)
            }
        }
    }
}

// Identity for merge commits on machines without a configured git user.
const MERGE_USER_NAME: &str = "user.name=theme-sync";
const MERGE_USER_EMAIL: &str = "user.email=theme-sync@localhost";

/// Backs out of a conflicted merge so the local checkout keeps its own state.
async fn abort_merge(clone_dir: &Path) {
    if !clone_dir.join(".git").join("MERGE_HEAD").exists() {
        return;
    }
    let result = Command::new("git")
        .arg("-C")
        .arg(clone_dir)
        .args(["merge", "--abort"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) if status.success() => {
            tracing::debug!(path = %clone_dir.display(), "Aborted conflicted merge")
        }
        Ok(status) => {
            tracing::warn!(path = %clone_dir.display(), %status, "git merge --abort failed")
        }
        Err(e) => {
            tracing::warn!(error = ?e, path = %clone_dir.display(), "Failed to launch git merge --abort")
        }
    }
}

#[async_trait::async_trait]
impl RepositorySync for GitRepositorySync {
    async fn sync(
        &self,
        repository: &str,
        destination_root: &Path,
        progress: &ProgressSink,
    ) -> Result<PathBuf, SyncError> {
        validate_locator(repository)?;
        let clone_dir = destination_root.join(repository_dir_name(repository));

        if clone_dir.exists() {
            tracing::debug!(path = %clone_dir.display(), "Repository directory exists, updating in place");
            self.update(repository, &clone_dir, progress).await
        } else {
            self.clone_fresh(repository, destination_root, &clone_dir, progress)
                .await
        }
    }
}

/// Accepts "owner/name" locators whose final segment names a directory
/// inside the providers root.
pub fn validate_locator(repository: &str) -> Result<(), SyncError> {
    let trimmed = repository.trim();
    let name = repository_dir_name(trimmed);
    if trimmed.is_empty() || !trimmed.contains('/') || matches!(name, "" | "." | "..") {
        tracing::error!(repository, "Repository name must be in format 'owner/name'");
        return Err(SyncError::InvalidLocator(repository.to_string()));
    }
    Ok(())
}

pub fn is_git_repository(dir: &Path) -> bool {
    dir.is_dir() && dir.join(".git").exists()
}

/// `remote.origin.url` of a local repository, if it has one.
pub async fn remote_url(dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["config", "--get", "remote.origin.url"])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| tracing::debug!(error = ?e, path = %dir.display(), "Failed to get remote URL"))
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!url.is_empty()).then_some(url)
}

/// Runs a git command, turning its stderr progress into progress events.
async fn run_git(
    mut command: Command,
    operation: &'static str,
    repository: &str,
    progress: &ProgressSink,
) -> Result<(), SyncError> {
    command
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|e| {
        tracing::error!(error = ?e, operation, repository, "Failed to launch git process");
        SyncError::Launch(e)
    })?;

    let mut last_error: Option<String> = None;
    if let Some(mut stderr) = child.stderr.take() {
        let mut pending: Vec<u8> = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let read = match stderr.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = ?e, operation, "Failed to read git output");
                    break;
                }
            };
            pending.extend_from_slice(&buf[..read]);
            // git rewrites progress lines in place with '\r'
            while let Some(pos) = pending.iter().position(|b| *b == b'\r' || *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                handle_git_line(&line[..line.len() - 1], progress, &mut last_error);
            }
        }
        if !pending.is_empty() {
            handle_git_line(&pending, progress, &mut last_error);
        }
    }

    let status = child.wait().await.map_err(|e| {
        tracing::error!(error = ?e, operation, repository, "Failed to wait for git process");
        SyncError::Launch(e)
    })?;

    if status.success() {
        Ok(())
    } else {
        tracing::error!(operation, repository, "Git exited with non-zero code: {}", status);
        Err(SyncError::GitFailed {
            operation,
            repository: repository.to_string(),
            status: last_error.unwrap_or_else(|| status.to_string()),
        })
    }
}

fn handle_git_line(raw: &[u8], progress: &ProgressSink, last_error: &mut Option<String>) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match parse_git_progress(line) {
        Some((task, completed, total)) => {
            if total > 0 {
                let (from, to) = phase_band(&task);
                let within = completed as f64 / total as f64;
                progress.report(task, from + (to - from) * within);
            }
        }
        None => {
            tracing::debug!(line, "git");
            if line.starts_with("fatal:") || line.starts_with("error:") {
                *last_error = Some(line.to_string());
            }
            progress.message(line.to_string());
        }
    }
}

/// `(task, completed, total)` from one git progress line.
pub fn parse_git_progress(line: &str) -> Option<(String, u64, u64)> {
    let caps = GIT_PROGRESS.captures(line)?;
    let task = caps.name("task")?.as_str().trim().to_string();
    let done = caps.name("done")?.as_str().parse().ok()?;
    let total = caps.name("total")?.as_str().parse().ok()?;
    Some((task, done, total))
}

/// Share of the sync step each git phase occupies.
fn phase_band(task: &str) -> (f64, f64) {
    match task {
        "Enumerating objects" | "Counting objects" | "Compressing objects" => (0.0, 0.1),
        "Receiving objects" | "Unpacking objects" => (0.1, 0.7),
        "Resolving deltas" => (0.7, 0.9),
        "Updating files" | "Checking out files" => (0.9, 1.0),
        _ => (0.0, 1.0),
    }
}
