//! # crew-orchestrator
//!
//! Drives the standard roster through development iterations.
//!
//! This crate provides:
//! - Stages: concurrent agent invocations joined before the pipeline advances
//! - Task derivation from the analysis stage's free text
//! - The five-stage iteration engine and the requirement-driven project run
//! - Git persistence behind a mockable executor
//! - The run controller (start/stop lifecycle, iteration gate, history)
//! - A markdown activity log under `.crew/`

mod activity_logger;
mod controller;
mod iteration;
mod persistence;
mod pipeline;
mod project;
mod task;

pub use activity_logger::ActivityLogger;
pub use controller::{RunController, StartOutcome, StopReason};
pub use iteration::{IterationEngine, DESIGN_EXCERPT_CHARS};
pub use persistence::{
    commit_message, GitCommand, GitExecutor, GitOutput, GitPersistence, MockGitExecutor,
    PersistenceStep,
};
pub use pipeline::Stage;
pub use project::{ProjectReport, ProjectRun, DEFAULT_REQUIREMENT, PROJECT_EXCERPT_CHARS};
pub use task::{derive_task, FALLBACK_PREFIX_CHARS, TASK_MARKERS};
