//! One iteration: analysis, design, implementation, validation, persistence
//!
//! Stage failures end the pass early and are turned into a failed record
//! here; persistence failures are logged and never fail the pass.

use crate::persistence::PersistenceStep;
use crate::pipeline::Stage;
use crate::task::derive_task;
use crew_agent::Roster;
use crew_core::fail_open::fail_open;
use crew_core::{truncate_chars, IterationRecord, IterationStatus, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Characters of the design handed to the implementation stage
pub const DESIGN_EXCERPT_CHARS: usize = 1000;

/// Characters of the analysis echoed to the log
const ANALYSIS_PREVIEW_CHARS: usize = 200;

/// Task recorded when a pass fails before a task is derived
const UNKNOWN_TASK: &str = "unknown";

/// Runs single iteration passes over a roster
pub struct IterationEngine {
    roster: Roster,
    project_path: PathBuf,
    persistence: Option<Arc<dyn PersistenceStep>>,
}

impl IterationEngine {
    pub fn new(roster: Roster, project_path: impl Into<PathBuf>) -> Self {
        Self {
            roster,
            project_path: project_path.into(),
            persistence: None,
        }
    }

    /// Persist each successful pass through `step`
    pub fn with_persistence(mut self, step: Arc<dyn PersistenceStep>) -> Self {
        self.persistence = Some(step);
        self
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Run one full pass and record its outcome
    #[instrument(skip(self))]
    pub async fn run(&self, iteration: u64) -> IterationRecord {
        let analysis = match self.analysis_stage().run_n::<1>().await {
            Ok([analysis]) => analysis,
            Err(e) => {
                warn!("Iteration failed: {}", e);
                return IterationRecord::new(
                    iteration,
                    UNKNOWN_TASK,
                    IterationStatus::Failed,
                    e.to_string(),
                );
            }
        };

        info!(
            "Analysis: {}...",
            truncate_chars(&analysis, ANALYSIS_PREVIEW_CHARS)
        );

        let Some(task) = derive_task(&analysis) else {
            warn!("Analysis produced no task, skipping iteration");
            return IterationRecord::new(
                iteration,
                UNKNOWN_TASK,
                IterationStatus::Skipped,
                "analysis produced no task",
            );
        };

        info!("Task: {}", task);

        match self.develop(&task).await {
            Ok(()) => {
                info!("Iteration complete");
                IterationRecord::new(
                    iteration,
                    task,
                    IterationStatus::Success,
                    "iteration complete",
                )
            }
            Err(e) => {
                warn!("Iteration failed: {}", e);
                IterationRecord::new(iteration, task, IterationStatus::Failed, e.to_string())
            }
        }
    }

    /// Design, implementation, validation and persistence for `task`
    async fn develop(&self, task: &str) -> Result<()> {
        let [design] = self.design_stage(task).run_n::<1>().await?;
        let design_excerpt = truncate_chars(&design, DESIGN_EXCERPT_CHARS);

        self.implementation_stage(task, &design_excerpt).run().await?;
        self.validation_stage(task).run().await?;

        if let Some(step) = &self.persistence {
            fail_open("persistence", || step.persist(task)).await;
        }

        Ok(())
    }

    fn analysis_stage(&self) -> Stage {
        Stage::new("analysis").invoke(
            &self.roster.product_manager,
            format!(
                "Analyse the current state of the project at {}, identify what can be \
                 improved and propose the next feature to develop.\n\n\
                 Requirements:\n\
                 1. Read the project code\n\
                 2. Find missing features or things that can be improved\n\
                 3. Propose one concrete development task\n\
                 4. Keep the task small enough to finish in one iteration",
                self.project_path.display()
            ),
        )
    }

    fn design_stage(&self, task: &str) -> Stage {
        Stage::new("design").invoke(
            &self.roster.architect,
            format!(
                "Design a technical solution for the following task:\n{}\n\nProject path: {}",
                task,
                self.project_path.display()
            ),
        )
    }

    fn implementation_stage(&self, task: &str, design: &str) -> Stage {
        let roster = &self.roster;
        Stage::new("implementation")
            .invoke(
                &roster.frontend,
                format!("Frontend task:\n{task}\n\nDesign:\n{design}"),
            )
            .invoke(
                &roster.backend,
                format!("Backend task:\n{task}\n\nDesign:\n{design}"),
            )
            .invoke(
                &roster.database,
                format!("Database task:\n{task}\n\nDesign:\n{design}"),
            )
            .invoke(&roster.assets, format!("Assets task:\n{task}"))
    }

    fn validation_stage(&self, task: &str) -> Stage {
        let roster = &self.roster;
        Stage::new("validation")
            .invoke(
                &roster.tester,
                format!("Write tests for the new feature:\n{task}"),
            )
            .invoke(
                &roster.security,
                format!("Audit the new code for security issues:\n{task}"),
            )
            .invoke(
                &roster.documenter,
                format!("Update the documentation for the new feature:\n{task}"),
            )
    }
}

impl std::fmt::Debug for IterationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterationEngine")
            .field("project_path", &self.project_path)
            .field("persistence", &self.persistence.is_some())
            .finish()
    }
}
