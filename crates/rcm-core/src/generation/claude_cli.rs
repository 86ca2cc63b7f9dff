//! Claude CLI generator adapter.
//!
//! Runs `claude -p --output-format json` once per model turn, feeding the
//! prompt on stdin and reading the JSON envelope from stdout. Tool use is
//! an in-process loop: the model answers either with a tool call or with
//! the final output, and tool results are appended to the next prompt.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, warn};

use super::registry::ToolRegistry;
use super::trait_def::StructuredGenerator;
use super::types::{GenerationError, GenerationRequest, ImageAttachment};

/// Default per-invocation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default cap on tool calls within one generation.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;

/// Settings for [`ClaudeCliGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeCliConfig {
    /// Path to the `claude` binary. Defaults to `"claude"` (found via `$PATH`).
    pub binary: String,
    /// Passed as `--model` when set.
    pub model: Option<String>,
    /// Upper bound on a single CLI invocation.
    pub timeout: Duration,
    pub max_tool_rounds: usize,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            model: None,
            timeout: DEFAULT_TIMEOUT,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

/// [`StructuredGenerator`] backed by the `claude` command-line client.
#[derive(Debug, Clone, Default)]
pub struct ClaudeCliGenerator {
    config: ClaudeCliConfig,
}

impl ClaudeCliGenerator {
    pub fn new(config: ClaudeCliConfig) -> Self {
        Self { config }
    }

    /// Default settings with a custom binary path.
    pub fn with_binary(path: impl Into<String>) -> Self {
        Self::new(ClaudeCliConfig {
            binary: path.into(),
            ..ClaudeCliConfig::default()
        })
    }

    pub fn config(&self) -> &ClaudeCliConfig {
        &self.config
    }

    /// Run the CLI once and return the model's result text.
    async fn invoke(&self, prompt: &str, image_dir: Option<&Path>) -> Result<String, GenerationError> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("-p").arg("--output-format").arg("json");
        if let Some(model) = &self.config.model {
            cmd.arg("--model").arg(model);
        }
        if let Some(dir) = image_dir {
            cmd.arg("--allowedTools").arg("Read").arg("--add-dir").arg(dir);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| GenerationError::Spawn {
            binary: self.config.binary.clone(),
            source,
        })?;

        // Feeding stdin and collecting output run together under one deadline:
        // a prompt larger than the pipe buffer blocks until the child reads it.
        let stdin = child.stdin.take();
        let (fed, output) = tokio::time::timeout(self.config.timeout, async {
            tokio::join!(feed_stdin(stdin, prompt), child.wait_with_output())
        })
        .await
        .map_err(|_| GenerationError::Timeout(self.config.timeout))?;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GenerationError::Process {
                status: output.status.to_string(),
                stderr,
            });
        }
        fed?;

        parse_envelope(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Write the prompt and close stdin. A child that exits without reading
/// everything closes the pipe; that is reported through its exit status.
async fn feed_stdin(stdin: Option<ChildStdin>, prompt: &str) -> std::io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    let written = async {
        stdin.write_all(prompt.as_bytes()).await?;
        stdin.shutdown().await
    }
    .await;
    match written {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!(bytes = prompt.len(), "claude closed stdin before reading the whole prompt");
            Ok(())
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Prompt and response helpers
// ---------------------------------------------------------------------------

/// One completed tool call, replayed to the model on the next turn.
#[derive(Debug, Clone)]
struct ToolExchange {
    name: String,
    input: Value,
    output: Value,
}

/// What the model asked for on a turn.
#[derive(Debug, Clone, PartialEq)]
enum Reply {
    ToolCall { name: String, input: Value },
    Output(Value),
}

/// Extract the result text from the CLI's `--output-format json` envelope.
fn parse_envelope(stdout: &str) -> Result<String, GenerationError> {
    let envelope: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid CLI envelope: {e}")))?;

    let result = envelope.get("result").and_then(|r| r.as_str());
    let is_error = envelope
        .get("is_error")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if is_error {
        return Err(GenerationError::Model(
            result.unwrap_or("unknown error").to_string(),
        ));
    }

    result.map(str::to_string).ok_or_else(|| {
        GenerationError::MalformedResponse("CLI envelope has no result text".into())
    })
}

/// Find the JSON value in free-form model text.
///
/// Accepts bare JSON, a fenced code block, or an object embedded in prose.
fn extract_json(text: &str) -> Result<Value, GenerationError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(body) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str(body) {
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(GenerationError::MalformedResponse(format!(
        "no JSON found in model output: {}",
        truncate(trimmed, 200)
    )))
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    // Skip the language tag on the opening fence line.
    let body_start = rest.find('\n')? + 1;
    let body = &rest[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

/// Classify a model turn. Without tools every reply is the output.
fn interpret_reply(value: Value, tools_enabled: bool) -> Reply {
    if !tools_enabled {
        return Reply::Output(value);
    }

    let call = value.get("tool_call").and_then(|call| {
        let name = call.get("name")?.as_str()?.to_string();
        let input = call.get("input").cloned().unwrap_or(Value::Null);
        Some(Reply::ToolCall { name, input })
    });
    if let Some(call) = call {
        return call;
    }

    match value {
        Value::Object(mut map) if map.contains_key("output") => {
            Reply::Output(map.remove("output").unwrap_or(Value::Null))
        }
        other => Reply::Output(other),
    }
}

fn render_prompt(
    request: &GenerationRequest<'_>,
    image_path: Option<&Path>,
    transcript: &[ToolExchange],
) -> String {
    let schema = serde_json::to_string_pretty(&request.schema).unwrap_or_default();
    let mut prompt = request.prompt.clone();

    if let Some(path) = image_path {
        prompt.push_str(&format!(
            "\n\nReference image: {}\nOpen it with the Read tool before answering.",
            path.display()
        ));
    }

    match request.tools.filter(|t| !t.is_empty()) {
        Some(tools) => {
            prompt.push_str(&render_tools(tools));
            prompt.push_str(&format!(
                "\n\nWhen you have the answer, reply with exactly one JSON object \
                 {{\"output\": <value>}} and nothing else, where <value> matches \
                 this JSON Schema:\n{schema}"
            ));
        }
        None => {
            prompt.push_str(&format!(
                "\n\nReply with a single JSON value matching this JSON Schema and \
                 nothing else:\n{schema}"
            ));
        }
    }

    if !transcript.is_empty() {
        prompt.push_str("\n\nTool results so far:");
        for exchange in transcript {
            prompt.push_str(&format!(
                "\n- {}({}) returned {}",
                exchange.name, exchange.input, exchange.output
            ));
        }
    }

    prompt
}

fn render_tools(tools: &ToolRegistry) -> String {
    let mut out = String::from(
        "\n\nYou can call the following tools. To call one, reply with exactly \
         {\"tool_call\": {\"name\": \"<tool name>\", \"input\": {...}}} and nothing else.",
    );
    for spec in tools.specs() {
        out.push_str(&format!(
            "\n- {}: {}\n  input schema: {}",
            spec.name, spec.description, spec.input_schema
        ));
    }
    out
}

/// Write the attachment into `dir` so the CLI's Read tool can open it.
fn stage_image(image: &ImageAttachment, dir: &Path) -> Result<PathBuf, GenerationError> {
    let path = dir.join(format!("reference.{}", image.extension()));
    std::fs::write(&path, image.decode()?)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// StructuredGenerator implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl StructuredGenerator for ClaudeCliGenerator {
    fn name(&self) -> &str {
        "claude-cli"
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Value, GenerationError> {
        let image_dir = match &request.image {
            Some(_) => Some(tempfile::tempdir()?),
            None => None,
        };
        let image_path = match (&request.image, &image_dir) {
            (Some(image), Some(dir)) => Some(stage_image(image, dir.path())?),
            _ => None,
        };

        let tools_enabled = request.tools.is_some_and(|t| !t.is_empty());
        let mut transcript: Vec<ToolExchange> = Vec::new();

        loop {
            let prompt = render_prompt(&request, image_path.as_deref(), &transcript);
            debug!(
                key = %request.key,
                round = transcript.len(),
                prompt_chars = prompt.len(),
                "invoking claude"
            );

            let text = self
                .invoke(&prompt, image_dir.as_ref().map(|d| d.path()))
                .await?;
            let value = extract_json(&text)?;

            match interpret_reply(value, tools_enabled) {
                Reply::Output(value) => return Ok(value),
                Reply::ToolCall { name, input } => {
                    if transcript.len() >= self.config.max_tool_rounds {
                        warn!(key = %request.key, tool = %name, "tool round limit reached");
                        return Err(GenerationError::ToolRoundsExceeded(
                            self.config.max_tool_rounds,
                        ));
                    }
                    let result = match request.tools {
                        Some(tools) => tools.invoke(&name, input.clone()).await,
                        None => Err(GenerationError::UnknownTool(name.clone())),
                    };
                    let output = match result {
                        Ok(output) => output,
                        Err(e @ (GenerationError::UnknownTool(_) | GenerationError::Tool { .. })) => {
                            warn!(key = %request.key, tool = %name, error = %e, "tool call failed");
                            serde_json::json!({ "error": e.to_string() })
                        }
                        Err(e) => return Err(e),
                    };
                    transcript.push(ToolExchange {
                        name,
                        input,
                        output,
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
