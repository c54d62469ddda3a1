//! Requirement-driven single pass over the full roster

use crate::activity_logger::ActivityLogger;
use crate::pipeline::Stage;
use crew_agent::Roster;
use crew_core::{truncate_chars, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Characters of earlier output handed to later stages
pub const PROJECT_EXCERPT_CHARS: usize = 2000;

/// Requirement used when none is supplied
pub const DEFAULT_REQUIREMENT: &str = "\
Build a task management system.

Features:
1. User registration and login (JWT authentication)
2. Create, edit and delete tasks
3. Task categories and tags
4. Task priority (high / medium / low)
5. Task due dates
6. Task search and filtering
7. Task statistics and reports

Technical requirements:
- Frontend: Vue 3 + TypeScript + Element Plus
- Backend: FastAPI + PostgreSQL
- Mobile-friendly layout
- Dark mode
";

/// Every role's output from a project run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub product_analysis: String,
    pub architecture: String,
    pub ui: String,
    pub backend: String,
    pub database: String,
    pub frontend: String,
    pub assets: String,
    pub testing: String,
    pub security: String,
    pub documentation: String,
}

/// Runs the five project stages once
#[derive(Debug)]
pub struct ProjectRun {
    roster: Roster,
    logger: Option<ActivityLogger>,
}

impl ProjectRun {
    pub fn new(roster: Roster) -> Self {
        Self {
            roster,
            logger: None,
        }
    }

    pub fn with_activity_logging(mut self, logger: ActivityLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Run every stage for `requirement`; the first stage failure aborts
    #[instrument(skip_all, fields(requirement_chars = requirement.chars().count()))]
    pub async fn run(&self, requirement: &str) -> Result<ProjectReport> {
        if let Some(logger) = &self.logger {
            logger.log_project_start(requirement).await;
        }

        let result = self.run_stages(requirement).await;

        if let Some(logger) = &self.logger {
            logger.log_project_complete(result.as_ref().err()).await;
        }

        result
    }

    async fn run_stages(&self, requirement: &str) -> Result<ProjectReport> {
        let roster = &self.roster;

        info!("Stage 1/5: requirement analysis");
        let [product_analysis] = Stage::new("analysis")
            .invoke(
                &roster.product_manager,
                format!("Analyse the following requirement and break it into concrete tasks:\n{requirement}"),
            )
            .run_n()
            .await?;

        info!("Stage 2/5: architecture");
        let [architecture] = Stage::new("design")
            .invoke(
                &roster.architect,
                format!(
                    "Design the system architecture for the following requirement:\n{}\n\nProduct analysis:\n{}",
                    requirement,
                    truncate_chars(&product_analysis, PROJECT_EXCERPT_CHARS)
                ),
            )
            .run_n()
            .await?;

        info!("Stage 3/5: UI, backend and database");
        let [ui, backend, database] = Stage::new("foundation")
            .invoke(&roster.ui_designer, "Design the UI system")
            .invoke(
                &roster.backend,
                format!(
                    "Develop the backend according to the architecture:\n{}",
                    truncate_chars(&architecture, PROJECT_EXCERPT_CHARS)
                ),
            )
            .invoke(&roster.database, "Design the database")
            .run_n()
            .await?;

        info!("Stage 4/5: frontend and assets");
        let [frontend, assets] = Stage::new("frontend")
            .invoke(&roster.frontend, "Implement the frontend pages")
            .invoke(&roster.assets, "Create the icon assets")
            .run_n()
            .await?;

        info!("Stage 5/5: testing, security and documentation");
        let [testing, security, documentation] = Stage::new("validation")
            .invoke(&roster.tester, "Write the test cases")
            .invoke(&roster.security, "Perform a security audit")
            .invoke(&roster.documenter, "Write the documentation")
            .run_n()
            .await?;

        info!("Project run complete");
        Ok(ProjectReport {
            product_analysis,
            architecture,
            ui,
            backend,
            database,
            frontend,
            assets,
            testing,
            security,
            documentation,
        })
    }
}
