//! Persistence step: commit (and optionally push) the iteration's changes

use async_trait::async_trait;
use crew_core::{truncate_chars, CrewError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Characters of the task kept in the commit subject
const COMMIT_SUBJECT_CHARS: usize = 50;

/// Commit message for an iteration's task
pub fn commit_message(task: &str) -> String {
    format!("auto: {}", truncate_chars(task, COMMIT_SUBJECT_CHARS))
}

/// Output from a git command
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl GitOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            ..Self::default()
        }
    }
}

impl From<Output> for GitOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }
}

/// Trait for executing git commands (allows mocking in tests)
#[async_trait]
pub trait GitExecutor: Send + Sync {
    async fn exec(&self, args: &[&str]) -> Result<GitOutput>;

    fn repo_root(&self) -> &Path;
}

/// Real git executor
#[derive(Debug, Clone)]
pub struct GitCommand {
    repo_root: PathBuf,
}

impl GitCommand {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }
}

#[async_trait]
impl GitExecutor for GitCommand {
    #[instrument(skip(self), fields(repo = %self.repo_root.display()))]
    async fn exec(&self, args: &[&str]) -> Result<GitOutput> {
        debug!("Executing git {:?}", args);

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|e| CrewError::Persistence(format!("Failed to execute git: {e}")))?;

        let git_output = GitOutput::from(output);
        if !git_output.success {
            debug!("git command failed: {}", git_output.stderr);
        }
        Ok(git_output)
    }

    fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

/// Mock git executor; succeeds unless told otherwise and records every call
#[derive(Debug, Clone, Default)]
pub struct MockGitExecutor {
    repo_root: PathBuf,
    responses: HashMap<String, GitOutput>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockGitExecutor {
    pub fn new() -> Self {
        Self {
            repo_root: PathBuf::from("/mock/repo"),
            ..Self::default()
        }
    }

    /// Respond to the command `args` (space-joined) with `output`
    pub fn with_response(mut self, command: &str, output: GitOutput) -> Self {
        self.responses.insert(command.to_string(), output);
        self
    }

    /// Commands executed so far, space-joined
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl GitExecutor for MockGitExecutor {
    async fn exec(&self, args: &[&str]) -> Result<GitOutput> {
        let key = args.join(" ");
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(key.clone());

        // Commit messages vary; match on the subcommand as well
        let subcommand = args.first().copied().unwrap_or_default();
        Ok(self
            .responses
            .get(&key)
            .or_else(|| self.responses.get(subcommand))
            .cloned()
            .unwrap_or_else(GitOutput::ok))
    }

    fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

/// The persistence boundary of an iteration
#[async_trait]
pub trait PersistenceStep: Send + Sync {
    /// Persist pending changes for `task`
    async fn persist(&self, task: &str) -> Result<()>;
}

/// Stage everything, commit with `auto: <task prefix>`, optionally push
#[derive(Debug, Clone)]
pub struct GitPersistence<E: GitExecutor> {
    executor: E,
    auto_push: bool,
}

impl<E: GitExecutor> GitPersistence<E> {
    pub fn new(executor: E, auto_push: bool) -> Self {
        Self {
            executor,
            auto_push,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<GitOutput> {
        let output = self.executor.exec(args).await?;
        if !output.success {
            return Err(CrewError::Persistence(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl<E: GitExecutor> PersistenceStep for GitPersistence<E> {
    #[instrument(skip(self, task), fields(repo = %self.executor.repo_root().display()))]
    async fn persist(&self, task: &str) -> Result<()> {
        self.run(&["add", "."]).await?;

        let message = commit_message(task);
        self.run(&["commit", "-m", &message]).await?;
        info!("Committed: {}", message);

        if self.auto_push {
            self.run(&["push"]).await?;
            info!("Pushed to remote");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_message_prefix() {
        assert_eq!(commit_message("add health check"), "auto: add health check");

        let long = "a".repeat(80);
        assert_eq!(commit_message(&long), format!("auto: {}", "a".repeat(50)));

        let cjk = "增加健康检查".repeat(20);
        let message = commit_message(&cjk);
        assert_eq!(message.chars().count(), "auto: ".len() + 50);
    }

    #[tokio::test]
    async fn test_commit_and_push() {
        let git = MockGitExecutor::new();
        let step = GitPersistence::new(git.clone(), true);

        step.persist("add health check").await.unwrap();

        assert_eq!(
            git.calls(),
            vec!["add .", "commit -m auto: add health check", "push"]
        );
    }

    #[tokio::test]
    async fn test_commit_without_push() {
        let git = MockGitExecutor::new();
        GitPersistence::new(git.clone(), false)
            .persist("task")
            .await
            .unwrap();

        assert_eq!(git.calls().len(), 2);
        assert!(!git.calls().contains(&"push".to_string()));
    }

    #[tokio::test]
    async fn test_nothing_to_commit_stops_before_push() {
        let git = MockGitExecutor::new()
            .with_response("commit", GitOutput::failed("nothing to commit, working tree clean"));
        let step = GitPersistence::new(git.clone(), true);

        let err = step.persist("task").await.unwrap_err();
        assert!(matches!(err, CrewError::Persistence(ref m) if m.contains("nothing to commit")));
        assert_eq!(git.calls(), vec!["add .", "commit -m auto: task"]);
    }

    #[tokio::test]
    async fn test_git_command_missing_directory() {
        let git = GitCommand::new("/definitely/not/a/repo/path");
        assert!(matches!(
            git.exec(&["status"]).await,
            Err(CrewError::Persistence(_))
        ));
    }
}
