//! Tool registry -- named callable tools a generator may invoke during a
//! single generation call.
//!
//! The plan stage registers the document retriever here; the generator
//! looks tools up by the name the model asked for.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::types::GenerationError;

/// Error returned by a tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid tool input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Failed(String),
}

/// A callable tool exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool.
    fn name(&self) -> &str;

    /// One-line description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema of the tool input.
    fn input_schema(&self) -> Value;

    async fn call(&self, input: Value) -> Result<Value, ToolError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Tool) {}
};

/// Description of a registered tool, as rendered into prompts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A collection of registered [`Tool`] implementations, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under [`Tool::name`], returning any tool it replaced.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Option<Box<dyn Tool>> {
        let name = tool.name().to_string();
        self.tools.insert(name, Box::new(tool))
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|b| b.as_ref())
    }

    /// Invoke a tool by name.
    ///
    /// Unknown names map to [`GenerationError::UnknownTool`]; tool failures
    /// map to [`GenerationError::Tool`].
    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value, GenerationError> {
        let tool = self
            .get(name)
            .ok_or_else(|| GenerationError::UnknownTool(name.to_string()))?;
        tracing::debug!(tool = name, "invoking tool");
        tool.call(input).await.map_err(|e| GenerationError::Tool {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    /// Specs of all registered tools, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
