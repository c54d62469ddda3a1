//! Runtime backed by the `claude` command-line agent
//!
//! The CLI runs in print mode with `--output-format stream-json`, which emits
//! one JSON object per line. Assistant text blocks become
//! [`RuntimeEvent::Text`], the final `result` line becomes
//! [`RuntimeEvent::Result`], everything else is progress.
//!
//! The prompt is written to the child's stdin, so its length is not bound by
//! the argument size limit. The child is killed as soon as the consumer drops
//! the [`EventStream`].

use super::{EventStream, ExecutionRuntime, InvocationRequest, RuntimeEvent, EVENT_BUFFER};
use async_trait::async_trait;
use crew_core::{CrewError, ReasoningMode, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Characters of stderr kept in failure messages
const STDERR_TAIL_CHARS: usize = 400;

/// Streaming runtime that spawns one `claude` process per invocation
#[derive(Debug, Clone)]
pub struct ClaudeCliRuntime {
    binary: String,
    working_dir: PathBuf,
    model: Option<String>,
}

impl ClaudeCliRuntime {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: "claude".to_string(),
            working_dir: working_dir.into(),
            model: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Command-line arguments for `request`; the prompt itself goes to stdin
    fn args(&self, request: &InvocationRequest) -> Vec<String> {
        let tools = request.tool_list();
        let mut args = vec![
            "-p".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--permission-mode".to_string(),
            request.permission_level.to_string(),
        ];

        if !request.instructions.is_empty() {
            args.push("--system-prompt".to_string());
            args.push(request.instructions.clone());
        }

        // --tools limits what exists, --allowedTools only skips the prompt
        args.push("--tools".to_string());
        args.push(tools.clone());
        if !tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(tools);
        }

        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        args
    }
}

/// Thinking budget environment value for a reasoning setting
fn thinking_tokens(request: &InvocationRequest) -> Option<String> {
    match request.reasoning.mode {
        ReasoningMode::Adaptive => None,
        ReasoningMode::Enabled => request.reasoning.budget_tokens.map(|b| b.to_string()),
        ReasoningMode::Disabled => Some("0".to_string()),
    }
}

/// Parse one stream-json line into events
pub(crate) fn parse_stream_line(line: &str) -> Vec<Result<RuntimeEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            debug!("Skipping non-JSON line from claude: {}", e);
            return Vec::new();
        }
    };

    match value.get("type").and_then(Value::as_str) {
        Some("assistant") => value
            .pointer("/message/content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| match block.get("type").and_then(Value::as_str) {
                        Some("text") => block
                            .get("text")
                            .and_then(Value::as_str)
                            .map(|t| Ok(RuntimeEvent::Text(t.to_string()))),
                        Some("tool_use") => {
                            let name = block.get("name").and_then(Value::as_str).unwrap_or("?");
                            Some(Ok(RuntimeEvent::Progress(format!("tool_use: {name}"))))
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default(),
        Some("result") => {
            let text = value
                .get("result")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let is_error = value
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if is_error {
                vec![Err(CrewError::Api(format!("claude reported an error: {text}")))]
            } else {
                vec![Ok(RuntimeEvent::Result(text))]
            }
        }
        Some(other) => vec![Ok(RuntimeEvent::Progress(other.to_string()))],
        None => Vec::new(),
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect()
    }
}

#[async_trait]
impl ExecutionRuntime for ClaudeCliRuntime {
    async fn invoke(&self, request: InvocationRequest) -> Result<EventStream> {
        let mut command = Command::new(&self.binary);
        command
            .args(self.args(&request))
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(tokens) = thinking_tokens(&request) {
            command.env("MAX_THINKING_TOKENS", tokens);
        }

        debug!(role = %request.role, "Spawning {}", self.binary);

        let mut child = command
            .spawn()
            .map_err(|e| CrewError::Other(format!("Failed to spawn {}: {}", self.binary, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CrewError::Other("claude stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CrewError::Other("claude stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| CrewError::Other("claude stderr not captured".to_string()))?;

        let (tx, stream) = EventStream::channel(EVENT_BUFFER);
        let InvocationRequest { role, prompt, .. } = request;

        tokio::spawn(async move {
            let stdin_role = role.clone();
            let stdin_task = tokio::spawn(async move {
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    debug!(role = %stdin_role, "Failed writing prompt to claude: {}", e);
                }
                // dropping stdin closes the pipe
            });
            let stderr_task = tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            });

            let mut lines = BufReader::new(stdout).lines();
            let mut saw_result = false;

            loop {
                let next = tokio::select! {
                    _ = tx.closed() => {
                        debug!(role = %role, "Event stream dropped, stopping claude");
                        stdin_task.abort();
                        return;
                    }
                    next = lines.next_line() => next,
                };

                match next {
                    Ok(Some(line)) => {
                        for event in parse_stream_line(&line) {
                            saw_result |= matches!(event, Ok(RuntimeEvent::Result(_)));
                            if tx.send(event).await.is_err() {
                                debug!(role = %role, "Event stream dropped, stopping claude");
                                stdin_task.abort();
                                return;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx
                            .send(Err(CrewError::Other(format!("Failed reading claude output: {e}"))))
                            .await;
                        return;
                    }
                }
            }

            let status = child.wait().await;
            let stderr = stderr_task.await.unwrap_or_default();

            match status {
                Ok(status) if status.success() || saw_result => {}
                Ok(status) => {
                    warn!(role = %role, "claude exited with {}", status);
                    let _ = tx
                        .send(Err(CrewError::Api(format!(
                            "claude exited with {}: {}",
                            status,
                            stderr_tail(&stderr)
                        ))))
                        .await;
                }
                Err(e) => {
                    let _ = tx
                        .send(Err(CrewError::Other(format!("Failed waiting for claude: {e}"))))
                        .await;
                }
            }
        });

        Ok(stream)
    }

    fn name(&self) -> &'static str {
        "claude-cli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crew_core::{Operation, PermissionLevel, ReasoningConfig};

    fn request() -> InvocationRequest {
        InvocationRequest {
            role: "backend".into(),
            instructions: "You build APIs.".into(),
            allowed_operations: vec![Operation::Read, Operation::Edit],
            permission_level: PermissionLevel::BypassPermissions,
            reasoning: ReasoningConfig::enabled(Some(8000)),
            prompt: "add an endpoint".into(),
        }
    }

    #[test]
    fn test_args() {
        let runtime = ClaudeCliRuntime::new("/tmp").with_model(Some("opus".into()));
        let args = runtime.args(&request());

        assert_eq!(&args[..2], &["-p".to_string(), "--output-format".to_string()]);
        assert!(!args.contains(&"add an endpoint".to_string()));
        let joined = args.join(" ");
        assert!(joined.contains("--output-format stream-json"));
        assert!(joined.contains("--permission-mode bypassPermissions"));
        assert!(joined.contains("--tools Read,Edit"));
        assert!(joined.contains("--allowedTools Read,Edit"));
        assert!(joined.contains("--system-prompt You build APIs."));
        assert!(joined.contains("--model opus"));
    }

    #[test]
    fn test_read_only_profile_restricts_available_tools() {
        let mut req = request();
        req.allowed_operations = vec![Operation::Read, Operation::Glob];
        let args = ClaudeCliRuntime::new("/tmp").args(&req);

        let tools = args.iter().position(|a| a == "--tools").unwrap();
        assert_eq!(args[tools + 1], "Read,Glob");
        assert!(!args.iter().any(|a| a.contains("Write") || a.contains("Bash")));
    }

    #[test]
    fn test_no_operations_disables_every_tool() {
        let mut req = request();
        req.allowed_operations.clear();
        let args = ClaudeCliRuntime::new("/tmp").args(&req);

        let tools = args.iter().position(|a| a == "--tools").unwrap();
        assert_eq!(args[tools + 1], "");
        assert!(!args.contains(&"--allowedTools".to_string()));
    }

    #[test]
    fn test_thinking_tokens() {
        let mut req = request();
        assert_eq!(thinking_tokens(&req), Some("8000".to_string()));
        req.reasoning = ReasoningConfig::disabled();
        assert_eq!(thinking_tokens(&req), Some("0".to_string()));
        req.reasoning = ReasoningConfig::adaptive();
        assert_eq!(thinking_tokens(&req), None);
    }

    #[test]
    fn test_parse_assistant_line() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Looking at files"},{"type":"tool_use","name":"Read","input":{}}]}}"#;
        let events: Vec<_> = parse_stream_line(line).into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                RuntimeEvent::Text("Looking at files".into()),
                RuntimeEvent::Progress("tool_use: Read".into()),
            ]
        );
    }

    #[test]
    fn test_parse_result_line() {
        let line = r#"{"type":"result","subtype":"success","is_error":false,"result":"Done."}"#;
        let events = parse_stream_line(line);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &RuntimeEvent::Result("Done.".into()));
    }

    #[test]
    fn test_parse_error_result() {
        let line = r#"{"type":"result","is_error":true,"result":"rate limited"}"#;
        let events = parse_stream_line(line);
        assert!(events[0].is_err());
    }

    #[test]
    fn test_parse_other_lines() {
        assert_eq!(
            parse_stream_line(r#"{"type":"system","subtype":"init"}"#)[0]
                .as_ref()
                .unwrap(),
            &RuntimeEvent::Progress("system".into())
        );
        assert!(parse_stream_line("not json").is_empty());
        assert!(parse_stream_line("   ").is_empty());
    }

    #[test]
    fn test_stderr_tail() {
        let long = "e".repeat(STDERR_TAIL_CHARS + 50);
        assert_eq!(stderr_tail(&long).len(), STDERR_TAIL_CHARS);
        assert_eq!(stderr_tail("  short \n"), "short");
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let runtime = ClaudeCliRuntime::new(".").with_binary("crew-definitely-missing-binary");
        assert!(runtime.invoke(request()).await.is_err());
    }

    #[cfg(unix)]
    mod fake_binary {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;
        use std::time::Duration;
        use tempfile::TempDir;

        const ASSISTANT: &str =
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"working"}]}}"#;
        const RESULT: &str = r#"{"type":"result","is_error":false,"result":"finished"}"#;

        /// Install `body` as an executable `claude` stand-in inside `dir`
        fn fake_claude(dir: &Path, body: &str) -> ClaudeCliRuntime {
            let path = dir.join("claude");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            ClaudeCliRuntime::new(dir).with_binary(path.to_string_lossy().into_owned())
        }

        async fn drain(mut stream: EventStream) -> Vec<Result<RuntimeEvent>> {
            let mut events = Vec::new();
            while let Some(event) = stream.next().await {
                events.push(event);
            }
            events
        }

        #[tokio::test]
        async fn test_streams_events_in_order_and_reads_prompt_from_stdin() {
            let dir = TempDir::new().unwrap();
            let runtime = fake_claude(
                dir.path(),
                &format!(
                    "printf '%s\\n' \"$@\" > args.txt\ncat > prompt.txt\necho '{ASSISTANT}'\necho '{{\"type\":\"system\"}}'\necho '{RESULT}'"
                ),
            );

            let events = drain(runtime.invoke(request()).await.unwrap()).await;
            let events: Vec<RuntimeEvent> = events.into_iter().map(|e| e.unwrap()).collect();
            assert_eq!(
                events,
                vec![
                    RuntimeEvent::Text("working".into()),
                    RuntimeEvent::Progress("system".into()),
                    RuntimeEvent::Result("finished".into()),
                ]
            );

            let prompt = std::fs::read_to_string(dir.path().join("prompt.txt")).unwrap();
            assert_eq!(prompt, "add an endpoint");
            let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
            assert!(args.lines().any(|l| l == "--tools"));
            assert!(!args.contains("add an endpoint"));
        }

        #[tokio::test]
        async fn test_oversized_prompt_is_delivered_whole() {
            let dir = TempDir::new().unwrap();
            let runtime = fake_claude(
                dir.path(),
                &format!("cat > prompt.txt\necho '{RESULT}'"),
            );
            let mut req = request();
            req.prompt = "x".repeat(200 * 1024);

            let events = drain(runtime.invoke(req).await.unwrap()).await;
            assert!(events.iter().all(|e| e.is_ok()));

            let written = std::fs::metadata(dir.path().join("prompt.txt")).unwrap().len();
            assert_eq!(written, 200 * 1024);
        }

        #[tokio::test]
        async fn test_nonzero_exit_reports_stderr() {
            let dir = TempDir::new().unwrap();
            let runtime = fake_claude(
                dir.path(),
                &format!("cat > /dev/null\necho '{ASSISTANT}'\necho 'invalid api key' >&2\nexit 3"),
            );

            let events = drain(runtime.invoke(request()).await.unwrap()).await;
            assert_eq!(events.len(), 2);
            assert_eq!(events[0].as_ref().unwrap(), &RuntimeEvent::Text("working".into()));
            let err = events[1].as_ref().unwrap_err().to_string();
            assert!(err.contains("invalid api key"), "unexpected error: {err}");
        }

        #[tokio::test]
        async fn test_dropping_stream_kills_child() {
            let dir = TempDir::new().unwrap();
            let runtime = fake_claude(
                dir.path(),
                &format!("cat > /dev/null\necho '{ASSISTANT}'\nsleep 2\ntouch late.txt"),
            );

            let mut stream = runtime.invoke(request()).await.unwrap();
            let first = stream.next().await.unwrap().unwrap();
            assert_eq!(first, RuntimeEvent::Text("working".into()));
            drop(stream);

            tokio::time::sleep(Duration::from_secs(4)).await;
            assert!(!dir.path().join("late.txt").exists());
        }
    }
}
