//! Stage 3: assess the consequences of each failure mode.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::PipelineError;
use crate::generation::{GenerationRequest, PromptKey, StructuredGenerator, generate_structured};
use crate::pipeline::Stage;

use super::bullet_list;

#[derive(Debug, Deserialize)]
struct AssessmentOutput {
    #[serde(default)]
    assessment: Option<String>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "assessment": {
                "type": "string",
                "description": "Markdown assessment of the consequences of each failure mode \
                                covering safety, environment, production and cost."
            }
        },
        "required": ["assessment"]
    })
}

fn prompt(failure_modes: &[String]) -> String {
    format!(
        "For the following failure modes, provide a detailed, in-depth consequence \
         assessment. Format the output as markdown, using headings and lists for clarity.\n\n\
         **Failure modes to assess:**\n{modes}\n\n\
         For each failure mode, detail the potential consequences in these dimensions:\n\
         * **Safety and occupational health:** risks to operators, maintenance staff and others.\n\
         * **Environmental impact:** leaks, emissions, contamination.\n\
         * **Production impact:** line stoppage, quality loss, reduced capacity.\n\
         * **Associated costs:** direct and indirect costs such as repair, lost production, \
         fines and reputational damage.\n\n\
         Be exhaustive and technical in your assessment.",
        modes = bullet_list(failure_modes),
    )
}

/// Ask the model for a markdown consequence assessment.
pub async fn assess_consequences(
    generator: &dyn StructuredGenerator,
    failure_modes: &[String],
) -> Result<String, PipelineError> {
    if failure_modes.is_empty() {
        return Err(PipelineError::MissingInput {
            stage: Stage::Assessment,
            input: "failure_modes",
        });
    }

    let request = GenerationRequest::new(
        PromptKey::ConsequenceAssessment,
        prompt(failure_modes),
        schema(),
    );
    let output: AssessmentOutput = generate_structured(generator, request)
        .await
        .map_err(PipelineError::generation(Stage::Assessment))?;

    match output.assessment.map(|a| a.trim().to_string()) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(PipelineError::EmptyResult {
            stage: Stage::Assessment,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::FakeGenerator;

    fn modes() -> Vec<String> {
        vec!["Mechanical seal leak".into()]
    }

    #[tokio::test]
    async fn returns_trimmed_assessment() {
        let generator = FakeGenerator::ok(json!({
            "assessment": "\n## Mechanical seal leak\n- Safety: slip hazard\n"
        }));
        let text = assess_consequences(&generator, &modes()).await.unwrap();
        assert_eq!(text, "## Mechanical seal leak\n- Safety: slip hazard");

        let seen = generator.seen();
        assert_eq!(seen.key, PromptKey::ConsequenceAssessment);
        assert!(seen.prompt.contains("- Mechanical seal leak"));
        for dimension in ["Safety", "Environmental", "Production", "costs"] {
            assert!(seen.prompt.contains(dimension), "missing {dimension}");
        }
    }

    #[tokio::test]
    async fn whitespace_is_empty_result() {
        let generator = FakeGenerator::ok(json!({ "assessment": "  \n" }));
        let err = assess_consequences(&generator, &modes()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptyResult {
                stage: Stage::Assessment
            }
        ));
    }

    #[tokio::test]
    async fn missing_field_is_empty_result() {
        let generator = FakeGenerator::ok(json!({}));
        let err = assess_consequences(&generator, &modes()).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResult { .. }));
    }

    #[tokio::test]
    async fn wrong_type_is_generation_error() {
        let generator = FakeGenerator::ok(json!({ "assessment": 42 }));
        let err = assess_consequences(&generator, &modes()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation { .. }));
    }
}
