//! Anthropic Messages API runtime
//!
//! Text-only: the request carries the agent's instructions as the system
//! prompt and the composed prompt as a single user message. Allowed
//! operations cannot be executed over plain HTTP and are only logged.

use super::{EventStream, ExecutionRuntime, InvocationRequest, RuntimeEvent};
use crate::auth;
use crate::circuit_breaker::CircuitBreaker;
use async_trait::async_trait;
use crew_core::{CrewError, ReasoningMode, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_MAX_TOKENS: usize = 16000;
const DEFAULT_THINKING_BUDGET: u32 = 10000;

// Rate limit retry configuration
const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF_SECS: u64 = 30;
const MAX_BACKOFF_SECS: u64 = 300;

// Shared across every agent using the HTTP runtime
static CIRCUIT_BREAKER: OnceLock<CircuitBreaker> = OnceLock::new();

fn circuit_breaker() -> &'static CircuitBreaker {
    CIRCUIT_BREAKER.get_or_init(CircuitBreaker::default)
}

#[derive(Debug, Clone, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Thinking>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Thinking {
    Enabled { budget_tokens: u32 },
    Disabled,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Runtime backed by the Anthropic HTTP Messages API
#[derive(Debug, Clone)]
pub struct AnthropicRuntime {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: usize,
}

impl AnthropicRuntime {
    /// Endpoint from `ANTHROPIC_BASE_URL`, or the public API
    pub fn new() -> Self {
        let base_url = std::env::var("ANTHROPIC_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            client: reqwest::Client::new(),
            base_url,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    /// Largest thinking budget the API accepts for this `max_tokens`
    fn budget_ceiling(&self) -> u32 {
        u32::try_from(self.max_tokens.saturating_sub(1)).unwrap_or(u32::MAX)
    }

    fn build_request(&self, request: &InvocationRequest) -> MessagesRequest {
        let thinking = match request.reasoning.mode {
            ReasoningMode::Adaptive => None,
            ReasoningMode::Enabled => Some(Thinking::Enabled {
                // budget_tokens must stay below max_tokens
                budget_tokens: request
                    .reasoning
                    .budget_tokens
                    .unwrap_or(DEFAULT_THINKING_BUDGET)
                    .min(self.budget_ceiling()),
            }),
            ReasoningMode::Disabled => Some(Thinking::Disabled),
        };

        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: request.instructions.clone(),
            messages: vec![Message {
                role: "user",
                content: request.prompt.clone(),
            }],
            thinking,
        }
    }

    async fn send(&self, body: &MessagesRequest) -> Result<MessagesResponse> {
        let breaker = circuit_breaker();
        if !breaker.can_execute() {
            return Err(CrewError::ApiLimit(format!(
                "Circuit breaker is OPEN - too many API failures. Wait {} seconds before retry.",
                breaker.time_until_retry().as_secs()
            )));
        }

        let (header, value) = auth::get_auth_token()?.header();
        let mut retries = 0;
        let mut backoff_secs = INITIAL_BACKOFF_SECS;

        loop {
            tracing::debug!(attempt = retries + 1, "Sending request to Anthropic API");

            let response = self
                .client
                .post(self.endpoint())
                .header(header, &value)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(body)
                .send()
                .await
                .map_err(|e| CrewError::Api(format!("Failed to send request: {e}")))?;

            let status = response.status();

            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RETRIES {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(CrewError::ApiLimit(format!(
                        "Rate limit exceeded after {MAX_RETRIES} retries. Last error: {error_text}"
                    )));
                }

                let wait_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(backoff_secs);

                tracing::warn!(
                    "Rate limited (429). Waiting {}s before retry {}/{}",
                    wait_secs,
                    retries,
                    MAX_RETRIES
                );
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                continue;
            }

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();

                if status.is_server_error() && retries < MAX_RETRIES {
                    retries += 1;
                    tracing::warn!(
                        "Server error ({}). Waiting {}s before retry {}/{}",
                        status,
                        backoff_secs,
                        retries,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                    continue;
                }

                breaker.record_failure();
                tracing::error!(
                    failures = breaker.failure_count(),
                    "Circuit breaker: recorded failure"
                );
                return Err(CrewError::Api(format!(
                    "Anthropic API error {status}: {error_text}"
                )));
            }

            let parsed = response
                .json::<MessagesResponse>()
                .await
                .map_err(|e| CrewError::Api(format!("Failed to parse response: {e}")))?;
            breaker.record_success();
            return Ok(parsed);
        }
    }
}

impl Default for AnthropicRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn response_events(response: MessagesResponse) -> Vec<Result<RuntimeEvent>> {
    let mut events: Vec<Result<RuntimeEvent>> = response
        .content
        .into_iter()
        .map(|block| match block.text {
            Some(text) if block.kind == "text" => Ok(RuntimeEvent::Text(text)),
            _ => Ok(RuntimeEvent::Progress(block.kind)),
        })
        .collect();

    if let Some(usage) = response.usage {
        events.push(Ok(RuntimeEvent::Progress(format!(
            "usage: {} input tokens, {} output tokens",
            usage.input_tokens, usage.output_tokens
        ))));
    }
    events
}

#[async_trait]
impl ExecutionRuntime for AnthropicRuntime {
    async fn invoke(&self, request: InvocationRequest) -> Result<EventStream> {
        if !request.allowed_operations.is_empty() {
            tracing::debug!(
                role = %request.role,
                tools = %request.tool_list(),
                "Operations are not executable over the HTTP runtime"
            );
        }

        let body = self.build_request(&request);
        let response = self.send(&body).await?;
        Ok(EventStream::from_events(response_events(response)))
    }

    fn name(&self) -> &'static str {
        "anthropic-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crew_core::{PermissionLevel, ReasoningConfig};

    fn request(reasoning: ReasoningConfig) -> InvocationRequest {
        InvocationRequest {
            role: "architect".into(),
            instructions: "You design systems.".into(),
            allowed_operations: Vec::new(),
            permission_level: PermissionLevel::BypassPermissions,
            reasoning,
            prompt: "Design a cache".into(),
        }
    }

    #[test]
    fn test_adaptive_omits_thinking() {
        let runtime = AnthropicRuntime::new().with_model(Some("m".into()));
        let json = serde_json::to_value(runtime.build_request(&request(ReasoningConfig::adaptive())))
            .unwrap();

        assert_eq!(json["model"], "m");
        assert_eq!(json["system"], "You design systems.");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Design a cache");
        assert!(json.get("thinking").is_none());
    }

    #[test]
    fn test_thinking_mapping() {
        let runtime = AnthropicRuntime::new();

        let enabled = runtime.build_request(&request(ReasoningConfig::enabled(Some(2048))));
        assert_eq!(
            serde_json::to_value(enabled.thinking).unwrap(),
            serde_json::json!({"type": "enabled", "budget_tokens": 2048})
        );

        let unbudgeted = runtime.build_request(&request(ReasoningConfig::enabled(None)));
        assert_eq!(
            unbudgeted.thinking,
            Some(Thinking::Enabled {
                budget_tokens: DEFAULT_THINKING_BUDGET
            })
        );

        let disabled = runtime.build_request(&request(ReasoningConfig::disabled()));
        assert_eq!(
            serde_json::to_value(disabled.thinking).unwrap(),
            serde_json::json!({"type": "disabled"})
        );
    }

    #[test]
    fn test_thinking_budget_stays_below_max_tokens() {
        let runtime = AnthropicRuntime::new();
        let body = runtime.build_request(&request(ReasoningConfig::enabled(Some(20000))));
        assert_eq!(
            body.thinking,
            Some(Thinking::Enabled {
                budget_tokens: (DEFAULT_MAX_TOKENS - 1) as u32
            })
        );

        let small = AnthropicRuntime::new().with_max_tokens(4096);
        let body = small.build_request(&request(ReasoningConfig::enabled(None)));
        assert_eq!(body.thinking, Some(Thinking::Enabled { budget_tokens: 4095 }));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let runtime = AnthropicRuntime::new().with_base_url("http://localhost:8080/");
        assert_eq!(runtime.endpoint(), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_response_events() {
        let response: MessagesResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Use an LRU."}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }))
        .unwrap();

        let events: Vec<RuntimeEvent> = response_events(response)
            .into_iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(events[0], RuntimeEvent::Progress("thinking".into()));
        assert_eq!(events[1], RuntimeEvent::Text("Use an LRU.".into()));
        assert!(matches!(&events[2], RuntimeEvent::Progress(p) if p.starts_with("usage")));
    }
}
