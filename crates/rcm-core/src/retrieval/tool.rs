//! The document retriever exposed to the model as a callable tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::DocumentRetriever;
use crate::generation::{Tool, ToolError};

/// Name the model uses to call the retriever.
pub const RETRIEVER_TOOL_NAME: &str = "maintenance_document_retriever";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieverInput {
    equipment_name: String,
}

/// [`Tool`] adapter over a shared [`DocumentRetriever`].
#[derive(Debug, Clone)]
pub struct RetrieverTool {
    retriever: Arc<DocumentRetriever>,
}

impl RetrieverTool {
    pub fn new(retriever: Arc<DocumentRetriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        RETRIEVER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Searches the maintenance knowledge base for manuals, reports and reference \
         values (procedures, limits, frequencies, costs) for a specific equipment."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "equipmentName": {
                    "type": "string",
                    "description": "Tag or name of the equipment to look up, e.g. \"PMP-001\"."
                }
            },
            "required": ["equipmentName"]
        })
    }

    async fn call(&self, input: Value) -> Result<Value, ToolError> {
        let input: RetrieverInput =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let result = self.retriever.retrieve(&input.equipment_name);
        serde_json::to_value(result).map_err(|e| ToolError::Failed(e.to_string()))
    }
}
