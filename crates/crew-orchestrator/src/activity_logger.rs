//! Human-readable run log at `.crew/activity.md`
//!
//! Every write is fail-open: a broken log never stops a run.

use crate::controller::StopReason;
use chrono::Utc;
use crew_core::config::CREW_DIR;
use crew_core::fail_open::fail_open;
use crew_core::{truncate_chars, CrewError, IterationRecord, IterationStatus, RunConfig};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Characters of a requirement shown in the log
const REQUIREMENT_PREVIEW_CHARS: usize = 200;

/// Appends run and iteration events to a markdown file
#[derive(Debug, Clone)]
pub struct ActivityLogger {
    output_path: PathBuf,
}

impl ActivityLogger {
    pub fn new(crew_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_path: crew_dir.into().join("activity.md"),
        }
    }

    /// Logger writing into `<project>/.crew/`
    pub fn for_project(project_path: &Path) -> Self {
        Self::new(project_path.join(CREW_DIR))
    }

    pub fn path(&self) -> &Path {
        &self.output_path
    }

    pub async fn log_run_start(&self, run_id: &str, config: &RunConfig) {
        let max = match config.max_iterations() {
            0 => "unlimited".to_string(),
            n => n.to_string(),
        };
        let content = format!(
            "# Run {}\n\
             **Started**: {}\n\
             **Project**: {}\n\
             **Max Iterations**: {}\n\
             **Interval**: {}s\n\
             **Auto-commit**: {} | **Auto-push**: {}\n\n---\n\n",
            run_id,
            timestamp(),
            config.project_path().display(),
            max,
            config.interval().as_secs(),
            config.auto_commit(),
            config.auto_push()
        );
        self.append("activity_logger::log_run_start", &content).await;
    }

    pub async fn log_iteration(&self, record: &IterationRecord) {
        let icon = match record.status {
            IterationStatus::Success => "✓",
            IterationStatus::Failed => "✗",
            IterationStatus::Skipped => "–",
        };
        let content = format!(
            "### Iteration {}\n\
             **Time**: {}\n\
             **Status**: {} {}\n\
             **Task**: {}\n\n\
             > {}\n\n---\n\n",
            record.iteration,
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            icon,
            record.status,
            record.task.replace('\n', " "),
            record.message.replace('\n', "\n> ")
        );
        self.append("activity_logger::log_iteration", &content).await;
    }

    pub async fn log_run_complete(&self, history: &[IterationRecord], reason: StopReason) {
        let count = |status: IterationStatus| history.iter().filter(|r| r.status == status).count();
        let content = format!(
            "## Run Summary\n\n\
             **Completed**: {}\n\
             **Total Iterations**: {}\n\
             **Succeeded**: {} | **Failed**: {} | **Skipped**: {}\n\
             **Stop Reason**: {}\n\n",
            timestamp(),
            history.len(),
            count(IterationStatus::Success),
            count(IterationStatus::Failed),
            count(IterationStatus::Skipped),
            reason
        );
        self.append("activity_logger::log_run_complete", &content).await;
    }

    pub async fn log_project_start(&self, requirement: &str) {
        let preview = truncate_chars(requirement.trim(), REQUIREMENT_PREVIEW_CHARS);
        let content = format!(
            "# Project Run\n**Started**: {}\n\n> {}\n\n---\n\n",
            timestamp(),
            preview.replace('\n', "\n> ")
        );
        self.append("activity_logger::log_project_start", &content).await;
    }

    pub async fn log_project_complete(&self, error: Option<&CrewError>) {
        let line = match error {
            None => "✓ All stages complete".to_string(),
            Some(e) => format!("✗ {e}"),
        };
        let content = format!(
            "## Project Summary\n\n**Completed**: {}\n**Outcome**: {}\n\n",
            timestamp(),
            line
        );
        self.append("activity_logger::log_project_complete", &content)
            .await;
    }

    async fn append(&self, operation: &str, content: &str) {
        fail_open(operation, || self.append_internal(content)).await;
    }

    async fn append_internal(&self, content: &str) -> crew_core::Result<()> {
        if let Some(parent) = self.output_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
