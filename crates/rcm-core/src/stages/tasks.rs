//! Stage 4: suggest maintenance tasks for the failure modes.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::PipelineError;
use crate::generation::{GenerationRequest, PromptKey, StructuredGenerator, generate_structured};
use crate::pipeline::Stage;

use super::{MaintenanceTask, bullet_list};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TasksOutput {
    #[serde(default)]
    maintenance_tasks: Vec<MaintenanceTask>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "maintenanceTasks": {
                "type": "array",
                "description": "Suggested maintenance tasks.",
                "items": {
                    "type": "object",
                    "properties": {
                        "task": { "type": "string", "description": "What to do." },
                        "type": {
                            "type": "string",
                            "description": "Maintenance type (preventive, predictive, corrective)."
                        },
                        "frequency": { "type": "string", "description": "Recommended frequency." },
                        "explanation": {
                            "type": "string",
                            "description": "How to perform the task and why it matters."
                        }
                    },
                    "required": ["task", "type", "frequency", "explanation"]
                }
            }
        },
        "required": ["maintenanceTasks"]
    })
}

fn prompt(equipment_name: &str, failure_modes: &[String]) -> String {
    format!(
        "You are an expert reliability engineer. Based on the failure modes identified for a \
         piece of equipment, suggest maintenance tasks that prevent or detect those failures.\n\n\
         Equipment: {equipment_name}\n\n\
         Failure modes:\n{modes}\n\n\
         For each task give a description, its type (preventive, predictive or corrective), \
         the recommended frequency, and a short explanation of how to perform it and why it \
         matters.",
        modes = bullet_list(failure_modes),
    )
}

/// Ask the model for maintenance tasks covering `failure_modes`.
///
/// The task `type` is passed through unchanged.
pub async fn suggest_tasks(
    generator: &dyn StructuredGenerator,
    equipment_name: &str,
    failure_modes: &[String],
) -> Result<Vec<MaintenanceTask>, PipelineError> {
    if failure_modes.is_empty() {
        return Err(PipelineError::MissingInput {
            stage: Stage::Tasks,
            input: "failure_modes",
        });
    }

    let request = GenerationRequest::new(
        PromptKey::SuggestTasks,
        prompt(equipment_name, failure_modes),
        schema(),
    );
    let output: TasksOutput = generate_structured(generator, request)
        .await
        .map_err(PipelineError::generation(Stage::Tasks))?;

    let tasks: Vec<MaintenanceTask> = output
        .maintenance_tasks
        .into_iter()
        .filter(|t| !t.is_blank())
        .collect();
    if tasks.is_empty() {
        return Err(PipelineError::EmptyResult { stage: Stage::Tasks });
    }
    tracing::debug!(count = tasks.len(), "suggested tasks");
    Ok(tasks)
}
