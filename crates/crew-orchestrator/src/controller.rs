//! Run controller: start/stop lifecycle around the iteration engine
//!
//! ```text
//! Idle ──start──▶ Running ──stop──▶ Stopping ──boundary──▶ Stopped
//!                    └──────────max iterations──────────────▶ Stopped
//! ```
//!
//! `stop()` is only observed at loop boundaries (before a pass and while
//! sleeping between passes); an in-flight pass always completes.

use crate::activity_logger::ActivityLogger;
use crate::iteration::IterationEngine;
use crew_core::{IterationRecord, RunConfig, RunStatus};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxIterations,
    StopRequested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxIterations => write!(f, "max iterations reached"),
            StopReason::StopRequested => write!(f, "stop requested"),
        }
    }
}

/// Result of calling [`RunController::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The loop ran and has now stopped
    Finished(StopReason),
    /// A run was already in progress; nothing happened
    AlreadyRunning,
}

#[derive(Debug, Default)]
struct RunState {
    status: RunStatus,
    iteration_count: u64,
    history: Vec<IterationRecord>,
}

/// Owns the run state; the loop inside `start` is its only writer
pub struct RunController {
    config: RunConfig,
    engine: IterationEngine,
    state: Mutex<RunState>,
    stop_tx: watch::Sender<bool>,
    logger: Option<ActivityLogger>,
    run_id: String,
}

impl RunController {
    pub fn new(config: RunConfig, engine: IterationEngine) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            config,
            engine,
            state: Mutex::new(RunState::default()),
            stop_tx,
            logger: None,
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Enable activity logging to `.crew/activity.md`
    pub fn with_activity_logging(mut self, logger: ActivityLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run iterations until the limit is reached or a stop is requested
    pub async fn start(&self) -> StartOutcome {
        {
            let mut state = self.lock();
            if matches!(state.status, RunStatus::Running | RunStatus::Stopping) {
                warn!("Run already in progress");
                return StartOutcome::AlreadyRunning;
            }
            state.status = RunStatus::Running;
            self.stop_tx.send_replace(false);
        }

        let mut stop_rx = self.stop_tx.subscribe();

        info!(
            run_id = %self.run_id,
            project = %self.config.project_path().display(),
            interval_secs = self.config.interval().as_secs(),
            max_iterations = self.config.max_iterations(),
            "Run started"
        );
        if let Some(logger) = &self.logger {
            logger.log_run_start(&self.run_id, &self.config).await;
        }

        let reason = loop {
            if *stop_rx.borrow_and_update() {
                break StopReason::StopRequested;
            }

            let iteration = {
                let mut state = self.lock();
                if self.config.limit_reached(state.iteration_count) {
                    break StopReason::MaxIterations;
                }
                state.iteration_count += 1;
                state.iteration_count
            };

            info!("=== Iteration {} ===", iteration);
            let record = self.engine.run(iteration).await;

            if let Some(logger) = &self.logger {
                logger.log_iteration(&record).await;
            }

            let completed = {
                let mut state = self.lock();
                state.history.push(record);
                state.iteration_count
            };

            if *stop_rx.borrow_and_update() {
                break StopReason::StopRequested;
            }
            if self.config.limit_reached(completed) {
                break StopReason::MaxIterations;
            }

            let interval = self.config.interval();
            if !interval.is_zero() {
                info!("Waiting {}s before the next iteration", interval.as_secs());
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.changed() => {}
                }
            }
        };

        let history = {
            let mut state = self.lock();
            state.status = RunStatus::Stopped;
            state.history.clone()
        };

        info!(run_id = %self.run_id, iterations = history.len(), %reason, "Run stopped");
        if let Some(logger) = &self.logger {
            logger.log_run_complete(&history, reason).await;
        }

        StartOutcome::Finished(reason)
    }

    /// Request a stop; takes effect at the next loop boundary
    pub fn stop(&self) {
        let mut state = self.lock();
        if state.status == RunStatus::Running {
            info!("Stopping after the current iteration");
            state.status = RunStatus::Stopping;
            self.stop_tx.send_replace(true);
        }
    }

    pub fn status(&self) -> RunStatus {
        self.lock().status
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status(), RunStatus::Running | RunStatus::Stopping)
    }

    pub fn iteration_count(&self) -> u64 {
        self.lock().iteration_count
    }

    /// Snapshot of every recorded iteration
    pub fn history(&self) -> Vec<IterationRecord> {
        self.lock().history.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for RunController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunController")
            .field("run_id", &self.run_id)
            .field("config", &self.config)
            .field("state", &*self.lock())
            .finish()
    }
}
