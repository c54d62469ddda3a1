//! The single concrete agent type

use crate::context::{ContextWindow, MemoryEntry, Origin, REPLAY_WINDOW};
use crate::profile::AgentProfile;
use crate::runtime::{ExecutionRuntime, InvocationRequest, RuntimeEvent};
use crew_core::{CrewError, PermissionLevel, ReasoningConfig, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument};

/// A role profile bound to an execution runtime, with private memory
///
/// `execute` takes `&self`: memory sits behind a mutex so agents can be
/// shared across the concurrent invocations of a stage.
pub struct Agent {
    profile: AgentProfile,
    permission_level: PermissionLevel,
    reasoning: ReasoningConfig,
    memory: Mutex<ContextWindow>,
    runtime: Arc<dyn ExecutionRuntime>,
}

impl Agent {
    pub fn new(profile: AgentProfile, runtime: Arc<dyn ExecutionRuntime>) -> Self {
        Self {
            profile,
            permission_level: PermissionLevel::default(),
            reasoning: ReasoningConfig::default(),
            memory: Mutex::new(ContextWindow::new()),
            runtime,
        }
    }

    pub fn with_permission_level(mut self, level: PermissionLevel) -> Self {
        self.permission_level = level;
        self
    }

    pub fn with_reasoning(mut self, reasoning: ReasoningConfig) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn role(&self) -> &str {
        self.profile.role()
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn permission_level(&self) -> PermissionLevel {
        self.permission_level
    }

    pub fn reasoning(&self) -> ReasoningConfig {
        self.reasoning
    }

    /// Snapshot of everything stored in memory
    pub fn memory(&self) -> Vec<MemoryEntry> {
        self.lock_memory().entries().to_vec()
    }

    /// Discard the agent's memory
    pub fn clear_memory(&self) {
        self.lock_memory().clear();
    }

    /// Run `task` through the runtime and collect the textual result
    ///
    /// Text fragments are joined with newlines in event order. Every
    /// assistant fragment is stored in memory as it arrives; the task itself
    /// is stored once the stream is exhausted. If the stream errors, the
    /// fragments already stored stay in memory and the task is not stored.
    #[instrument(skip(self, task), fields(role = %self.profile.role(), runtime = self.runtime.name()))]
    pub async fn execute(&self, task: &str) -> Result<String> {
        if task.trim().is_empty() {
            return Err(CrewError::execution(self.role(), "task is empty"));
        }

        let request = InvocationRequest {
            role: self.role().to_string(),
            instructions: self.profile.instructions().to_string(),
            allowed_operations: self.profile.allowed_operations().to_vec(),
            permission_level: self.permission_level,
            reasoning: self.reasoning,
            prompt: self.build_prompt(task),
        };

        debug!("Prompt length: {} chars", request.prompt.len());

        let mut stream = self
            .runtime
            .invoke(request)
            .await
            .map_err(|e| self.execution_error(e))?;

        let mut fragments: Vec<String> = Vec::new();
        let mut events = 0usize;

        while let Some(event) = stream.next().await {
            let event = event.map_err(|e| self.execution_error(e))?;
            events += 1;

            match &event {
                RuntimeEvent::Text(text) if !text.is_empty() => {
                    self.lock_memory().append(Origin::Assistant, text);
                }
                RuntimeEvent::Progress(note) => debug!("runtime progress: {}", note),
                _ => {}
            }

            if let Some(text) = event.text().filter(|t| !t.is_empty()) {
                fragments.push(text.to_string());
            }
        }

        if events == 0 {
            return Err(CrewError::execution(
                self.role(),
                "runtime produced no events",
            ));
        }

        self.lock_memory().append(Origin::User, task);

        debug!("Collected {} fragments from {} events", fragments.len(), events);
        Ok(fragments.join("\n"))
    }

    /// Prepend the replay window to `task`
    fn build_prompt(&self, task: &str) -> String {
        let context = self.lock_memory().render_recent(REPLAY_WINDOW);
        if context.is_empty() {
            task.to_string()
        } else {
            format!("Previous context:\n{context}\n\nCurrent task:\n{task}")
        }
    }

    fn execution_error(&self, err: CrewError) -> CrewError {
        match err {
            CrewError::Execution { .. } => err,
            other => CrewError::execution(self.role(), other.to_string()),
        }
    }

    fn lock_memory(&self) -> MutexGuard<'_, ContextWindow> {
        self.memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.profile.role())
            .field("permission_level", &self.permission_level)
            .field("reasoning", &self.reasoning)
            .field("runtime", &self.runtime.name())
            .finish()
    }
}
