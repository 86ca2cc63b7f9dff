//! Stage 2: derive likely failure modes from the equipment functions.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::PipelineError;
use crate::generation::{GenerationRequest, PromptKey, StructuredGenerator, generate_structured};
use crate::pipeline::Stage;

use super::{bullet_list, clean_items};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailureModesOutput {
    #[serde(default)]
    failure_modes: Vec<String>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "failureModes": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Likely failure modes based on the equipment functions."
            }
        },
        "required": ["failureModes"]
    })
}

fn prompt(equipment_name: &str, functions: &[String]) -> String {
    format!(
        "You are a reliability engineer specialized in FMEA (Failure Mode and Effects Analysis). \
         For the equipment \"{equipment_name}\", which performs the functions below, list the \
         most likely and technically relevant failure modes.\n\n\
         **Functions:**\n{functions}\n\n\
         For each function, propose one or more potential failure modes. Be specific and \
         detailed, considering the root cause and the immediate effect of the failure.",
        functions = bullet_list(functions),
    )
}

/// Ask the model for the failure modes of `functions`.
///
/// The result is a flat list; the function each mode came from is not
/// kept. An empty `functions` input is rejected before generation.
pub async fn derive_failure_modes(
    generator: &dyn StructuredGenerator,
    equipment_name: &str,
    functions: &[String],
) -> Result<Vec<String>, PipelineError> {
    if functions.is_empty() {
        return Err(PipelineError::MissingInput {
            stage: Stage::FailureModes,
            input: "functions",
        });
    }

    let request = GenerationRequest::new(
        PromptKey::FailureModes,
        prompt(equipment_name, functions),
        schema(),
    );
    let output: FailureModesOutput = generate_structured(generator, request)
        .await
        .map_err(PipelineError::generation(Stage::FailureModes))?;

    let failure_modes = clean_items(output.failure_modes);
    if failure_modes.is_empty() {
        return Err(PipelineError::EmptyResult {
            stage: Stage::FailureModes,
        });
    }
    tracing::debug!(count = failure_modes.len(), "derived failure modes");
    Ok(failure_modes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::FakeGenerator;

    fn functions() -> Vec<String> {
        vec!["Pump coolant".into(), "Contain fluid".into()]
    }

    #[tokio::test]
    async fn returns_flat_list() {
        let generator = FakeGenerator::ok(json!({
            "failureModes": ["Impeller wear", "Mechanical seal leak", "Bearing seizure"]
        }));
        let modes = derive_failure_modes(&generator, "PMP-001", &functions())
            .await
            .unwrap();
        assert_eq!(modes.len(), 3);

        let seen = generator.seen();
        assert_eq!(seen.key, PromptKey::FailureModes);
        assert!(seen.prompt.contains("\"PMP-001\""));
        assert!(seen.prompt.contains("- Pump coolant\n- Contain fluid"));
    }

    #[tokio::test]
    async fn empty_output_is_never_silent() {
        let generator = FakeGenerator::ok(json!({ "failureModes": ["", " "] }));
        let err = derive_failure_modes(&generator, "PMP-001", &functions())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptyResult {
                stage: Stage::FailureModes
            }
        ));
    }

    #[tokio::test]
    async fn missing_functions_skip_generation() {
        let generator = FakeGenerator::ok(json!({ "failureModes": ["x"] }));
        let err = derive_failure_modes(&generator, "PMP-001", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingInput {
                stage: Stage::FailureModes,
                input: "functions"
            }
        ));
    }
}
