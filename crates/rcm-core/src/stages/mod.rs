//! The five analysis stages.
//!
//! Each stage is a free function that builds its prompt, calls the
//! generator once, and validates the structured result. Stages do not
//! retry; an empty result is reported as [`PipelineError::EmptyResult`].
//!
//! | stage | fn | output |
//! |-------|----|--------|
//! | functions | [`identify_functions`] | `Vec<String>` |
//! | failure modes | [`derive_failure_modes`] | `Vec<String>` |
//! | assessment | [`assess_consequences`] | markdown `String` |
//! | tasks | [`suggest_tasks`] | `Vec<MaintenanceTask>` |
//! | plan | [`synthesize_plan`] | markdown `String` |
//!
//! [`PipelineError::EmptyResult`]: crate::error::PipelineError::EmptyResult

pub mod assessment;
pub mod failure_modes;
pub mod functions;
pub mod plan;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use assessment::assess_consequences;
pub use failure_modes::derive_failure_modes;
pub use functions::identify_functions;
pub use plan::{PlanInput, synthesize_plan};
pub use tasks::suggest_tasks;

/// A suggested maintenance action.
///
/// `task_type` is free text as produced by the model; use
/// [`MaintenanceTask::kind`] for a normalized category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceTask {
    #[serde(default)]
    pub task: String,
    #[serde(rename = "type", default)]
    pub task_type: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub explanation: String,
}

impl MaintenanceTask {
    pub fn kind(&self) -> TaskKind {
        TaskKind::classify(&self.task_type)
    }

    fn is_blank(&self) -> bool {
        self.task.trim().is_empty()
    }
}

/// Normalized maintenance category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Preventive,
    Predictive,
    Corrective,
    Other,
}

impl TaskKind {
    /// Classify a free-text type. Accepts English and Portuguese spellings
    /// ("Preventive", "preventiva", "Predictive maintenance", "corretiva").
    pub fn classify(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with("prevent") {
            Self::Preventive
        } else if lower.starts_with("predict") || lower.starts_with("predit") {
            Self::Predictive
        } else if lower.starts_with("correct") || lower.starts_with("corret") {
            Self::Corrective
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Preventive => "preventive",
            Self::Predictive => "predictive",
            Self::Corrective => "corrective",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Trim entries and drop blank ones.
pub(crate) fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Render items as a markdown bullet list.
pub(crate) fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
