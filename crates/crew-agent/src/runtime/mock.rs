//! Scripted execution runtime for testing

use super::{EventStream, ExecutionRuntime, InvocationRequest, RuntimeEvent};
use async_trait::async_trait;
use crew_core::{CrewError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Scripted behaviour for one role
#[derive(Debug, Clone)]
enum Script {
    /// Stream these events, then end
    Events(Vec<RuntimeEvent>),
    /// Refuse the invocation outright
    Fail(String),
    /// Stream these events, then error
    FailAfter(Vec<RuntimeEvent>, String),
}

/// Mock runtime keyed by role name
///
/// Roles without a script answer with [`MockRuntime::always`]'s text, or
/// `"<role> done"` by default. Every request is recorded.
#[derive(Debug, Default)]
pub struct MockRuntime {
    scripts: HashMap<String, Script>,
    fallback: Option<String>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<InvocationRequest>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every unscripted role with `text`
    pub fn always(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Answer `role` with one text fragment and a matching result
    pub fn with_response(self, role: &str, text: &str) -> Self {
        self.with_events(
            role,
            vec![
                RuntimeEvent::Text(text.to_string()),
                RuntimeEvent::Result(text.to_string()),
            ],
        )
    }

    pub fn with_events(mut self, role: &str, events: Vec<RuntimeEvent>) -> Self {
        self.scripts.insert(role.to_string(), Script::Events(events));
        self
    }

    /// Make every invocation of `role` fail before streaming
    pub fn with_failure(mut self, role: &str, message: &str) -> Self {
        self.scripts
            .insert(role.to_string(), Script::Fail(message.to_string()));
        self
    }

    /// Stream `events` for `role`, then fail
    pub fn with_stream_failure(
        mut self,
        role: &str,
        events: Vec<RuntimeEvent>,
        message: &str,
    ) -> Self {
        self.scripts.insert(
            role.to_string(),
            Script::FailAfter(events, message.to_string()),
        );
        self
    }

    /// Delay every invocation of `role`
    pub fn with_delay(mut self, role: &str, delay: Duration) -> Self {
        self.delays.insert(role.to_string(), delay);
        self
    }

    /// Number of invocations of `role`
    pub fn calls(&self, role: &str) -> usize {
        self.lock().iter().filter(|r| r.role == role).count()
    }

    /// Number of invocations across all roles
    pub fn total_calls(&self) -> usize {
        self.lock().len()
    }

    /// Prompts sent for `role`, oldest first
    pub fn prompts(&self, role: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|r| r.role == role)
            .map(|r| r.prompt.clone())
            .collect()
    }

    pub fn last_request(&self, role: &str) -> Option<InvocationRequest> {
        self.lock().iter().rev().find(|r| r.role == role).cloned()
    }

    /// Roles in invocation order
    pub fn call_order(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.role.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<InvocationRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ExecutionRuntime for MockRuntime {
    async fn invoke(&self, request: InvocationRequest) -> Result<EventStream> {
        let role = request.role.clone();
        self.lock().push(request);

        if let Some(delay) = self.delays.get(&role) {
            tokio::time::sleep(*delay).await;
        }

        let script = self.scripts.get(&role).cloned().unwrap_or_else(|| {
            let text = self
                .fallback
                .clone()
                .unwrap_or_else(|| format!("{role} done"));
            Script::Events(vec![RuntimeEvent::Text(text.clone()), RuntimeEvent::Result(text)])
        });

        match script {
            Script::Events(events) => Ok(EventStream::from_events(
                events.into_iter().map(Ok).collect(),
            )),
            Script::Fail(message) => Err(CrewError::Api(message)),
            Script::FailAfter(events, message) => {
                let mut items: Vec<Result<RuntimeEvent>> = events.into_iter().map(Ok).collect();
                items.push(Err(CrewError::Api(message)));
                Ok(EventStream::from_events(items))
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crew_core::{PermissionLevel, ReasoningConfig};

    fn request(role: &str) -> InvocationRequest {
        InvocationRequest {
            role: role.to_string(),
            instructions: String::new(),
            allowed_operations: Vec::new(),
            permission_level: PermissionLevel::default(),
            reasoning: ReasoningConfig::default(),
            prompt: format!("prompt for {role}"),
        }
    }

    #[tokio::test]
    async fn test_default_response_and_counts() {
        let runtime = MockRuntime::new();
        let mut stream = runtime.invoke(request("tester")).await.unwrap();

        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            RuntimeEvent::Text("tester done".into())
        );
        assert_eq!(runtime.calls("tester"), 1);
        assert_eq!(runtime.calls("security"), 0);
        assert_eq!(runtime.prompts("tester"), vec!["prompt for tester".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_as_call() {
        let runtime = MockRuntime::new().with_failure("architect", "nope");
        assert!(runtime.invoke(request("architect")).await.is_err());
        assert_eq!(runtime.calls("architect"), 1);
    }
}
