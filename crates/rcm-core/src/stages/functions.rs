//! Stage 1: identify the primary and secondary functions of the equipment.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::PipelineError;
use crate::generation::{GenerationRequest, PromptKey, StructuredGenerator, generate_structured};
use crate::pipeline::Stage;

use super::clean_items;

#[derive(Debug, Deserialize)]
struct FunctionsOutput {
    #[serde(default)]
    functions: Vec<String>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "functions": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Key functions performed by the equipment."
            }
        },
        "required": ["functions"]
    })
}

fn prompt(tag: &str, description: &str) -> String {
    format!(
        "You are a senior maintenance engineer documenting the functions of a piece of equipment.\n\n\
         Based on the tag and description below, describe each primary and secondary function \
         of the equipment. For each function, briefly explain its purpose and its importance \
         in the overall process. Be thorough and technical.\n\n\
         **Equipment tag:** {tag}\n\
         **Equipment description:** {description}"
    )
}

/// Ask the model for the equipment's functions.
///
/// Blank entries are dropped; an empty list is [`PipelineError::EmptyResult`].
pub async fn identify_functions(
    generator: &dyn StructuredGenerator,
    tag: &str,
    description: &str,
) -> Result<Vec<String>, PipelineError> {
    let request = GenerationRequest::new(
        PromptKey::IdentifyFunctions,
        prompt(tag, description),
        schema(),
    );
    let output: FunctionsOutput = generate_structured(generator, request)
        .await
        .map_err(PipelineError::generation(Stage::Functions))?;

    let functions = clean_items(output.functions);
    if functions.is_empty() {
        return Err(PipelineError::EmptyResult {
            stage: Stage::Functions,
        });
    }
    tracing::debug!(count = functions.len(), "identified functions");
    Ok(functions)
}
