//! Execution runtime boundary
//!
//! A runtime turns a prompt plus an agent's profile into a sequence of
//! [`RuntimeEvent`]s delivered over an [`EventStream`]. The agent drains the
//! stream until it is exhausted or yields an error.

mod api;
mod cli;
mod mock;

pub use api::AnthropicRuntime;
pub use cli::ClaudeCliRuntime;
pub use mock::MockRuntime;

use async_trait::async_trait;
use crew_core::{Operation, PermissionLevel, ReasoningConfig, Result};
use tokio::sync::mpsc;

/// Buffer size for runtime event channels
pub(crate) const EVENT_BUFFER: usize = 64;

/// One event produced by the execution runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// Durable assistant-produced text
    Text(String),
    /// Terminal result of the invocation
    Result(String),
    /// Non-textual activity (tool use, session notices); never collected
    Progress(String),
}

impl RuntimeEvent {
    /// Text contributed to the collected result, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Result(text) => Some(text),
            Self::Progress(_) => None,
        }
    }
}

/// Everything a runtime needs to invoke an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub role: String,
    pub instructions: String,
    pub allowed_operations: Vec<Operation>,
    pub permission_level: PermissionLevel,
    pub reasoning: ReasoningConfig,
    pub prompt: String,
}

impl InvocationRequest {
    /// Comma-separated tool names for the allowed operations
    pub fn tool_list(&self) -> String {
        self.allowed_operations
            .iter()
            .map(Operation::tool_name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Receiving half of a runtime's event sequence
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Result<RuntimeEvent>>,
}

impl EventStream {
    /// Create a connected sender/stream pair
    pub fn channel(buffer: usize) -> (mpsc::Sender<Result<RuntimeEvent>>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }

    /// A finished stream holding exactly `events`
    pub fn from_events(events: Vec<Result<RuntimeEvent>>) -> Self {
        let (tx, stream) = Self::channel(events.len());
        for event in events {
            if tx.try_send(event).is_err() {
                break;
            }
        }
        stream
    }

    /// Next event, or `None` once the producer is done
    pub async fn next(&mut self) -> Option<Result<RuntimeEvent>> {
        self.rx.recv().await
    }
}

/// Trait for the external agent-execution runtime (allows mocking in tests)
#[async_trait]
pub trait ExecutionRuntime: Send + Sync {
    /// Start an invocation and return its event stream
    async fn invoke(&self, request: InvocationRequest) -> Result<EventStream>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
