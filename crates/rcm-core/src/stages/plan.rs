//! Stage 5: synthesize the final maintenance plan.
//!
//! Sources are tried in order:
//!
//! 1. operator reference material (inlined text or an attached image);
//! 2. the knowledge base, through the `maintenance_document_retriever` tool;
//! 3. the model's general domain knowledge.
//!
//! The retriever tool is registered on every call, so tier 2 is available
//! even when the operator material turns out to be insufficient.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::equipment::{EquipmentDescriptor, ReferenceMaterial};
use crate::error::PipelineError;
use crate::generation::{
    GenerationRequest, ImageAttachment, PromptKey, StructuredGenerator, ToolRegistry,
    generate_structured,
};
use crate::pipeline::Stage;
use crate::retrieval::DocumentRetriever;
use crate::retrieval::tool::{RETRIEVER_TOOL_NAME, RetrieverTool};

use super::MaintenanceTask;

/// Everything the plan is built from.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    pub descriptor: &'a EquipmentDescriptor,
    pub functions: &'a [String],
    pub failure_modes: &'a [String],
    pub assessment: &'a str,
    /// Suggested tasks, when the caller has them.
    pub tasks: Option<&'a [MaintenanceTask]>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanOutput {
    #[serde(default)]
    maintenance_plan: Option<String>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "maintenancePlan": {
                "type": "string",
                "description": "Detailed markdown maintenance plan organized under level-2 headings."
            }
        },
        "required": ["maintenancePlan"]
    })
}

fn prompt(input: &PlanInput<'_>) -> String {
    let descriptor = input.descriptor;
    let mut out = format!(
        "You are a senior maintenance and reliability engineer who writes optimized, detailed \
         RCM (Reliability Centered Maintenance) plans.\n\n\
         Your task is to produce an exceptionally detailed, professional maintenance plan from \
         the information below.\n\n\
         **Equipment data:**\n\
         - **Tag:** {tag}\n\
         - **Description:** {description}\n\
         - **Critical functions:** {functions}\n\
         - **Identified failure modes:** {failure_modes}\n\
         - **Consequence assessment:**\n{assessment}\n",
        tag = descriptor.tag(),
        description = descriptor.description(),
        functions = input.functions.join(", "),
        failure_modes = input.failure_modes.join(", "),
        assessment = input.assessment,
    );

    if let Some(tasks) = input.tasks.filter(|t| !t.is_empty()) {
        out.push_str("\n**Suggested tasks:**\n");
        for t in tasks {
            out.push_str(&format!(
                "- {} ({}, {}): {}\n",
                t.task, t.task_type, t.frequency, t.explanation
            ));
        }
    }

    match descriptor.reference_material() {
        Some(ReferenceMaterial::Text { content }) => {
            out.push_str(&format!(
                "\n**Operator-supplied reference material (primary source of truth):**\n\
                 {content}\n\n\
                 Prefer concrete values from this material (frequencies, procedures, limits, \
                 costs) over general knowledge.\n"
            ));
        }
        Some(ReferenceMaterial::Image { .. }) => {
            out.push_str(
                "\n**Operator-supplied reference material (primary source of truth):** an image \
                 of the manual or equipment is attached. Extract concrete values from it \
                 (frequencies, procedures, limits, costs) and prefer them over general \
                 knowledge.\n",
            );
        }
        None => {}
    }

    out.push_str(&format!(
        "\nIf no reference material is provided, or it is insufficient, call the \
         `{RETRIEVER_TOOL_NAME}` tool with equipmentName \"{tag}\" to search the maintenance \
         knowledge base for the equipment manual, and use the excerpts it returns. If nothing \
         useful is found, rely on your technical knowledge and the equipment data above to \
         produce the most complete plan possible.\n\n\
         Format the plan in markdown. Start every section with a level-2 heading (`## `) and \
         include at least these sections:\n\
         ## Preventive Maintenance Tasks\n\
         Inspections, lubrication, cleaning and scheduled replacements.\n\
         ## Predictive Maintenance Tasks\n\
         Techniques such as vibration analysis, thermography, oil analysis and ultrasound.\n\
         ## Recommended Procedures\n\
         For each task state the frequency, the maintenance type, a step-by-step procedure \
         with tools and materials, and the technical justification naming the failure mode \
         it mitigates.",
        tag = descriptor.tag(),
    ));

    out
}

/// Ask the model for the final plan, giving it the retriever tool.
pub async fn synthesize_plan(
    generator: &dyn StructuredGenerator,
    retriever: Arc<DocumentRetriever>,
    input: &PlanInput<'_>,
) -> Result<String, PipelineError> {
    if input.functions.is_empty() {
        return Err(PipelineError::MissingInput {
            stage: Stage::Plan,
            input: "functions",
        });
    }
    if input.failure_modes.is_empty() {
        return Err(PipelineError::MissingInput {
            stage: Stage::Plan,
            input: "failure_modes",
        });
    }
    if input.assessment.trim().is_empty() {
        return Err(PipelineError::MissingInput {
            stage: Stage::Plan,
            input: "assessment",
        });
    }

    let mut tools = ToolRegistry::new();
    tools.register(RetrieverTool::new(retriever));

    let image = input
        .descriptor
        .reference_material()
        .and_then(ImageAttachment::from_reference);

    tracing::debug!(
        tag = input.descriptor.tag(),
        reference = input.descriptor.reference_material().is_some(),
        image = image.is_some(),
        "synthesizing plan"
    );

    let request = GenerationRequest::new(PromptKey::MaintenancePlan, prompt(input), schema())
        .with_image(image)
        .with_tools(&tools);
    let output: PlanOutput = generate_structured(generator, request)
        .await
        .map_err(PipelineError::generation(Stage::Plan))?;

    match output.maintenance_plan.map(|p| p.trim().to_string()) {
        Some(plan) if !plan.is_empty() => Ok(plan),
        _ => Err(PipelineError::EmptyResult { stage: Stage::Plan }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::FakeGenerator;

    struct Fixture {
        descriptor: EquipmentDescriptor,
        functions: Vec<String>,
        failure_modes: Vec<String>,
        assessment: String,
    }

    impl Fixture {
        fn new(tag: &str, reference: Option<ReferenceMaterial>) -> Self {
            Self {
                descriptor: EquipmentDescriptor::new(tag, "Centrifugal coolant pump", reference)
                    .unwrap(),
                functions: vec!["Pump coolant".into(), "Contain fluid".into()],
                failure_modes: vec!["Seal leak".into(), "Bearing seizure".into()],
                assessment: "## Seal leak\nHigh environmental impact".into(),
            }
        }

        fn input(&self) -> PlanInput<'_> {
            PlanInput {
                descriptor: &self.descriptor,
                functions: &self.functions,
                failure_modes: &self.failure_modes,
                assessment: &self.assessment,
                tasks: None,
            }
        }
    }

    fn retriever() -> Arc<DocumentRetriever> {
        Arc::new(DocumentRetriever::builtin())
    }

    fn plan_response() -> Value {
        json!({ "maintenancePlan": "## Preventive Maintenance Tasks\nLubricate.\n" })
    }

    #[tokio::test]
    async fn plan_without_material_offers_retriever() {
        let fixture = Fixture::new("PMP-001", None);
        let generator = FakeGenerator::ok(plan_response());
        let plan = synthesize_plan(&generator, retriever(), &fixture.input())
            .await
            .unwrap();
        assert_eq!(plan, "## Preventive Maintenance Tasks\nLubricate.");

        let seen = generator.seen();
        assert_eq!(seen.key, PromptKey::MaintenancePlan);
        assert_eq!(seen.tools, vec![RETRIEVER_TOOL_NAME]);
        assert!(!seen.has_image);
        assert!(seen.prompt.contains("Pump coolant, Contain fluid"));
        assert!(seen.prompt.contains("Seal leak, Bearing seizure"));
        assert!(seen.prompt.contains("equipmentName \"PMP-001\""));
        assert!(!seen.prompt.contains("primary source of truth"));
    }

    #[tokio::test]
    async fn text_material_is_inlined_as_primary_source() {
        let material = ReferenceMaterial::parse("Grease bearings with Polyrex EM every 2000h");
        let fixture = Fixture::new("PMP-001", material);
        let generator = FakeGenerator::ok(plan_response());
        synthesize_plan(&generator, retriever(), &fixture.input())
            .await
            .unwrap();

        let seen = generator.seen();
        assert!(!seen.has_image);
        assert!(seen.prompt.contains("primary source of truth"));
        assert!(seen.prompt.contains("Polyrex EM every 2000h"));
        assert_eq!(seen.tools, vec![RETRIEVER_TOOL_NAME]);
    }

    #[tokio::test]
    async fn image_material_is_attached() {
        let material = ReferenceMaterial::parse("data:image/png;base64,iVBORw0KGgo=");
        let fixture = Fixture::new("PMP-001", material);
        let generator = FakeGenerator::ok(plan_response());
        synthesize_plan(&generator, retriever(), &fixture.input())
            .await
            .unwrap();

        let seen = generator.seen();
        assert!(seen.has_image);
        assert!(seen.prompt.contains("image of the manual"));
        assert!(!seen.prompt.contains("iVBORw0KGgo"));
    }

    #[tokio::test]
    async fn retriever_tool_reaches_knowledge_base() {
        let fixture = Fixture::new("PMP-001-EAST", None);
        let generator = FakeGenerator::ok(plan_response())
            .calling_tool(RETRIEVER_TOOL_NAME, json!({ "equipmentName": "PMP-001-EAST" }));
        synthesize_plan(&generator, retriever(), &fixture.input())
            .await
            .unwrap();

        let output = generator.seen().tool_output.unwrap();
        assert_eq!(output["found"], true);
        assert_eq!(output["documentName"], "KSB-001 Centrifugal Pump Manual.pdf");
    }

    #[tokio::test]
    async fn retrieval_miss_still_produces_plan() {
        let fixture = Fixture::new("UNKNOWN-999", None);
        let generator = FakeGenerator::ok(plan_response())
            .calling_tool(RETRIEVER_TOOL_NAME, json!({ "equipmentName": "UNKNOWN-999" }));
        let plan = synthesize_plan(&generator, retriever(), &fixture.input())
            .await
            .unwrap();
        assert!(plan.starts_with("## "));
        assert_eq!(generator.seen().tool_output.unwrap(), json!({ "found": false }));
    }

    #[tokio::test]
    async fn suggested_tasks_are_included() {
        let fixture = Fixture::new("PMP-001", None);
        let tasks = vec![MaintenanceTask {
            task: "Vibration analysis".into(),
            task_type: "predictive".into(),
            frequency: "500 h".into(),
            explanation: "Detect imbalance".into(),
        }];
        let input = PlanInput {
            tasks: Some(&tasks),
            ..fixture.input()
        };
        let generator = FakeGenerator::ok(plan_response());
        synthesize_plan(&generator, retriever(), &input).await.unwrap();
        assert!(generator
            .seen()
            .prompt
            .contains("- Vibration analysis (predictive, 500 h): Detect imbalance"));
    }

    #[tokio::test]
    async fn empty_plan_is_empty_result() {
        let fixture = Fixture::new("PMP-001", None);
        let generator = FakeGenerator::ok(json!({ "maintenancePlan": "" }));
        let err = synthesize_plan(&generator, retriever(), &fixture.input())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResult { stage: Stage::Plan }));
    }

    #[tokio::test]
    async fn blank_assessment_is_missing_input() {
        let mut fixture = Fixture::new("PMP-001", None);
        fixture.assessment = "  ".into();
        let generator = FakeGenerator::ok(plan_response());
        let err = synthesize_plan(&generator, retriever(), &fixture.input())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingInput {
                stage: Stage::Plan,
                input: "assessment"
            }
        ));
    }
}
