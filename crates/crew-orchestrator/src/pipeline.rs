//! Stages of the phase pipeline
//!
//! A stage fans out one invocation per (agent, prompt) pair and resolves only
//! when every invocation has completed. The first failure fails the stage and
//! drops the invocations still in flight.

use crew_agent::Agent;
use crew_core::{CrewError, Result};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// One stage: a named set of concurrent agent invocations
#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    invocations: Vec<(Arc<Agent>, String)>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            invocations: Vec::new(),
        }
    }

    /// Add an invocation of `agent` with `prompt`
    pub fn invoke(mut self, agent: &Arc<Agent>, prompt: impl Into<String>) -> Self {
        self.invocations.push((Arc::clone(agent), prompt.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    /// Run every invocation concurrently; outputs follow insertion order
    ///
    /// On failure the error is a [`CrewError::Stage`] naming the failing role.
    #[instrument(skip(self), fields(stage = %self.name, agents = self.invocations.len()))]
    pub async fn run(&self) -> Result<Vec<String>> {
        info!("Stage started");

        let outputs = try_join_all(self.invocations.iter().map(|(agent, prompt)| async move {
            agent.execute(prompt).await.map_err(|e| {
                warn!(role = agent.role(), "Invocation failed: {}", e);
                e.in_stage(self.name.as_str(), agent.role())
            })
        }))
        .await?;

        info!("Stage complete");
        Ok(outputs)
    }

    /// Run and destructure into exactly `N` outputs
    pub async fn run_n<const N: usize>(&self) -> Result<[String; N]> {
        let outputs = self.run().await?;
        outputs.try_into().map_err(|outputs: Vec<String>| {
            CrewError::Other(format!(
                "stage {} produced {} outputs, expected {}",
                self.name,
                outputs.len(),
                N
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crew_agent::{AgentProfile, MockRuntime};
    use crew_core::Operation;
    use std::time::Duration;

    fn agent(role: &str, runtime: &Arc<MockRuntime>) -> Arc<Agent> {
        Arc::new(Agent::new(
            AgentProfile::new(role, format!("You are {role}."), [Operation::Read]),
            runtime.clone(),
        ))
    }

    #[tokio::test]
    async fn test_outputs_in_insertion_order() {
        let runtime = Arc::new(
            MockRuntime::new()
                .with_events("a", vec![crew_agent::RuntimeEvent::Text("alpha".into())])
                .with_events("b", vec![crew_agent::RuntimeEvent::Text("beta".into())]),
        );
        let stage = Stage::new("pair")
            .invoke(&agent("a", &runtime), "go")
            .invoke(&agent("b", &runtime), "go");

        assert_eq!(stage.len(), 2);
        assert_eq!(stage.run().await.unwrap(), vec!["alpha", "beta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_waits_for_slowest() {
        let runtime = Arc::new(
            MockRuntime::new()
                .with_delay("fast", Duration::from_millis(10))
                .with_delay("slow", Duration::from_millis(500))
                .with_delay("medium", Duration::from_millis(100)),
        );
        let stage = Stage::new("fan-out")
            .invoke(&agent("fast", &runtime), "go")
            .invoke(&agent("slow", &runtime), "go")
            .invoke(&agent("medium", &runtime), "go");

        let started = tokio::time::Instant::now();
        let outputs = stage.run().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(outputs, vec!["fast done\nfast done", "slow done\nslow done", "medium done\nmedium done"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invocations_run_concurrently() {
        let runtime = Arc::new(
            MockRuntime::new()
                .with_delay("a", Duration::from_secs(1))
                .with_delay("b", Duration::from_secs(1)),
        );
        let stage = Stage::new("parallel")
            .invoke(&agent("a", &runtime), "go")
            .invoke(&agent("b", &runtime), "go");

        let started = tokio::time::Instant::now();
        stage.run().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_failure_names_failing_member() {
        let runtime = Arc::new(MockRuntime::new().with_failure("backend", "upstream down"));
        let stage = Stage::new("implementation")
            .invoke(&agent("frontend", &runtime), "go")
            .invoke(&agent("backend", &runtime), "go")
            .invoke(&agent("database", &runtime), "go");

        let err = stage.run().await.unwrap_err();
        match &err {
            CrewError::Stage { stage, role, source } => {
                assert_eq!(stage, "implementation");
                assert_eq!(role, "backend");
                assert!(matches!(**source, CrewError::Execution { .. }));
            }
            other => panic!("expected stage failure, got {other:?}"),
        }
        assert!(err.to_string().contains("backend"));
    }

    #[tokio::test]
    async fn test_success_does_not_mask_sibling_failure() {
        let runtime = Arc::new(
            MockRuntime::new()
                .with_delay("ok", Duration::from_millis(5))
                .with_stream_failure(
                    "flaky",
                    vec![crew_agent::RuntimeEvent::Text("partial".into())],
                    "dropped",
                ),
        );
        let stage = Stage::new("validation")
            .invoke(&agent("ok", &runtime), "go")
            .invoke(&agent("flaky", &runtime), "go");

        let err = stage.run().await.unwrap_err();
        assert_eq!(err.role(), Some("flaky"));
    }

    #[tokio::test]
    async fn test_run_n() {
        let runtime = Arc::new(MockRuntime::always("ok"));
        let stage = Stage::new("two")
            .invoke(&agent("a", &runtime), "go")
            .invoke(&agent("b", &runtime), "go");

        let [a, b] = stage.run_n::<2>().await.unwrap();
        assert_eq!(a, "ok\nok");
        assert_eq!(b, "ok\nok");
        assert!(matches!(stage.run_n::<3>().await, Err(CrewError::Other(_))));
    }

    #[tokio::test]
    async fn test_empty_stage() {
        let stage = Stage::new("nothing");
        assert!(stage.is_empty());
        assert!(stage.run().await.unwrap().is_empty());
    }
}
