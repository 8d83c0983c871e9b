//! `git` command-line adapter for the source-control port

use async_trait::async_trait;
use labkit_domain::{GitState, SourceControl, SourceControlError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Default per-command timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Source control backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: PathBuf,
    timeout: Duration,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

/// Outcome of one git invocation
enum RunOutcome {
    Success(String),
    Failed(String),
    NotInstalled,
}

impl GitCommand {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("git"),
            timeout,
        }
    }

    /// Use a different executable, e.g. a pinned git build
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, root: &Path, args: &[&str]) -> Result<RunOutcome, SourceControlError> {
        let display = format!("git {}", args.join(" "));

        let mut command = Command::new(&self.program);
        command.arg("-C").arg(root).args(args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RunOutcome::NotInstalled);
            }
            Err(e) => {
                return Err(SourceControlError::Command {
                    command: display,
                    message: e.to_string(),
                });
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| SourceControlError::Command {
                command: display.clone(),
                message: e.to_string(),
            })?,
            Err(_) => return Err(SourceControlError::Timeout { command: display }),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Ok(RunOutcome::Failed(stderr));
        }

        let stdout =
            String::from_utf8(output.stdout).map_err(|e| SourceControlError::InvalidOutput {
                command: display,
                message: e.to_string(),
            })?;
        Ok(RunOutcome::Success(stdout.trim().to_string()))
    }

    /// Run a command that must succeed once the repository is known to exist
    async fn required(&self, root: &Path, args: &[&str]) -> Result<String, SourceControlError> {
        match self.run(root, args).await? {
            RunOutcome::Success(stdout) => Ok(stdout),
            RunOutcome::Failed(stderr) => Err(SourceControlError::Command {
                command: format!("git {}", args.join(" ")),
                message: stderr,
            }),
            RunOutcome::NotInstalled => Err(SourceControlError::Command {
                command: format!("git {}", args.join(" ")),
                message: "git executable not found".to_string(),
            }),
        }
    }
}

#[async_trait]
impl SourceControl for GitCommand {
    async fn reproduce(
        &self,
        root: &Path,
        excludes: &[String],
    ) -> Result<Option<GitState>, SourceControlError> {
        match self.run(root, &["rev-parse", "--git-dir"]).await? {
            RunOutcome::Success(_) => {}
            RunOutcome::Failed(stderr) => {
                tracing::debug!(root = %root.display(), stderr = %stderr, "No git repository");
                return Ok(None);
            }
            RunOutcome::NotInstalled => {
                tracing::warn!("git executable not found, skipping repository state");
                return Ok(None);
            }
        }

        let head = self.required(root, &["rev-parse", "HEAD"]).await?;
        let branch = self
            .required(root, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await?;
        let changed = self
            .required(root, &["diff-index", "--name-only", "HEAD", "--"])
            .await?;

        let mut diff_args = vec!["diff", "--patch", "HEAD", "--"];
        diff_args.extend(excludes.iter().map(String::as_str));
        let patch = self.required(root, &diff_args).await?;

        tracing::debug!(head = %head, branch = %branch, dirty = !changed.is_empty(), "Read git state");

        Ok(Some(GitState {
            head,
            branch,
            dirty: !changed.is_empty(),
            patch,
        }))
    }
}

/// Source control that always reports a fixed state
#[derive(Debug, Clone, Default)]
pub struct StaticSourceControl {
    state: Option<GitState>,
}

impl StaticSourceControl {
    pub fn new(state: Option<GitState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl SourceControl for StaticSourceControl {
    async fn reproduce(
        &self,
        _root: &Path,
        _excludes: &[String],
    ) -> Result<Option<GitState>, SourceControlError> {
        Ok(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    async fn git(root: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(root)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Create a repository with one commit, or `None` when git is unusable
    async fn init_repo(root: &Path) -> Option<()> {
        let steps: [&[&str]; 5] = [
            &["init", "-q", "-b", "main"],
            &["config", "user.email", "lab@example.com"],
            &["config", "user.name", "Lab"],
            &["add", "."],
            &["commit", "-q", "-m", "initial"],
        ];
        for step in steps {
            if !git(root, step).await {
                return None;
            }
        }
        Some(())
    }

    #[tokio::test]
    async fn test_outside_repository_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let state = GitCommand::default()
            .reproduce(dir.path(), &[])
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_missing_executable_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let state = GitCommand::default()
            .with_program("/nonexistent/git-binary")
            .reproduce(dir.path(), &[])
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_reads_head_branch_and_patch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.py"), "print(1)\n").unwrap();
        fs::write(dir.path().join("paper.tex"), "draft\n").unwrap();
        if init_repo(dir.path()).await.is_none() {
            return;
        }

        let scm = GitCommand::default();
        let clean = scm
            .reproduce(dir.path(), &[])
            .await
            .unwrap()
            .expect("repository state");
        assert_eq!(clean.head.len(), 40);
        assert_eq!(clean.branch, "main");
        assert!(!clean.dirty);
        assert!(clean.patch.is_empty());

        fs::write(dir.path().join("run.py"), "print(2)\n").unwrap();
        fs::write(dir.path().join("paper.tex"), "final\n").unwrap();
        let excludes = vec![":!*.tex".to_string()];
        let dirty = scm
            .reproduce(dir.path(), &excludes)
            .await
            .unwrap()
            .expect("repository state");
        assert!(dirty.dirty);
        assert_eq!(dirty.head, clean.head);
        assert!(dirty.patch.contains("+print(2)"));
        assert!(!dirty.patch.contains("paper.tex"));
    }

    #[tokio::test]
    async fn test_static_source_control() {
        let state = GitState {
            head: "deadbeef".to_string(),
            branch: "main".to_string(),
            dirty: true,
            patch: "diff".to_string(),
        };
        let scm = StaticSourceControl::new(Some(state.clone()));
        assert_eq!(
            scm.reproduce(Path::new("."), &[]).await.unwrap(),
            Some(state)
        );
        assert_eq!(
            StaticSourceControl::default()
                .reproduce(Path::new("."), &[])
                .await
                .unwrap(),
            None
        );
    }
}
