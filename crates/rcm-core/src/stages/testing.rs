//! Single-response generator for stage unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::generation::{GenerationError, GenerationRequest, PromptKey, StructuredGenerator};

/// What the fake saw on its last call.
#[derive(Debug, Clone)]
pub(crate) struct Seen {
    pub key: PromptKey,
    pub prompt: String,
    pub has_image: bool,
    pub tools: Vec<String>,
    pub tool_output: Option<Value>,
}

/// Returns one fixed response and remembers the request.
///
/// With `call_tool` set, invokes that tool through the request's registry
/// before answering.
pub(crate) struct FakeGenerator {
    response: Result<Value, String>,
    call_tool: Option<(String, Value)>,
    seen: Mutex<Option<Seen>>,
}

impl FakeGenerator {
    pub fn ok(value: Value) -> Self {
        Self {
            response: Ok(value),
            call_tool: None,
            seen: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            call_tool: None,
            seen: Mutex::new(None),
        }
    }

    pub fn calling_tool(mut self, name: &str, input: Value) -> Self {
        self.call_tool = Some((name.to_string(), input));
        self
    }

    pub fn seen(&self) -> Seen {
        self.seen
            .lock()
            .unwrap()
            .clone()
            .expect("generator was not called")
    }
}

#[async_trait]
impl StructuredGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<Value, GenerationError> {
        let mut tool_output = None;
        if let (Some((name, input)), Some(tools)) = (&self.call_tool, request.tools) {
            tool_output = Some(tools.invoke(name, input.clone()).await?);
        }

        *self.seen.lock().unwrap() = Some(Seen {
            key: request.key,
            prompt: request.prompt.clone(),
            has_image: request.image.is_some(),
            tools: request
                .tools
                .map(|t| t.names().into_iter().map(String::from).collect())
                .unwrap_or_default(),
            tool_output,
        });

        self.response.clone().map_err(GenerationError::Model)
    }
}
