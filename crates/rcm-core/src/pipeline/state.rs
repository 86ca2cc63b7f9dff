//! Pipeline state machine.
//!
//! A run advances through the stages in a fixed order and terminates in
//! either `done` or `failed(<stage>)`:
//!
//! ```text
//! running(functions) -> running(failure_modes) -> running(assessment)
//!     -> running(tasks) -> running(plan) -> done
//!
//! running(<stage>) -> failed(<stage>)
//! ```
//!
//! Results of completed stages are kept after a failure so callers can
//! display partial output.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::stages::MaintenanceTask;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One step of the five-step analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Functions,
    FailureModes,
    Assessment,
    Tasks,
    Plan,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::Functions,
        Stage::FailureModes,
        Stage::Assessment,
        Stage::Tasks,
        Stage::Plan,
    ];

    /// Zero-based position in [`Stage::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::Functions => 0,
            Self::FailureModes => 1,
            Self::Assessment => 2,
            Self::Tasks => 3,
            Self::Plan => 4,
        }
    }

    /// The stage that follows this one, or `None` for the last stage.
    pub fn next(self) -> Option<Stage> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Human-readable title used in progress output.
    pub fn title(self) -> &'static str {
        match self {
            Self::Functions => "Equipment functions",
            Self::FailureModes => "Failure mode analysis",
            Self::Assessment => "Consequence assessment",
            Self::Tasks => "Maintenance tasks",
            Self::Plan => "Maintenance plan",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Functions => "functions",
            Self::FailureModes => "failure_modes",
            Self::Assessment => "assessment",
            Self::Tasks => "tasks",
            Self::Plan => "plan",
        };
        f.write_str(s)
    }
}

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "functions" => Ok(Self::Functions),
            "failure_modes" => Ok(Self::FailureModes),
            "assessment" => Ok(Self::Assessment),
            "tasks" => Ok(Self::Tasks),
            "plan" => Ok(Self::Plan),
            other => Err(StageParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Stage`] string.
#[derive(Debug, Clone, Error)]
#[error("invalid stage: {0:?}")]
pub struct StageParseError(pub String);

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "stage", rename_all = "snake_case")]
pub enum PipelinePhase {
    Running(Stage),
    Done,
    Failed(Stage),
}

impl PipelinePhase {
    /// The stage being executed, or `None` once the run has terminated.
    pub fn current_stage(self) -> Option<Stage> {
        match self {
            Self::Running(stage) => Some(stage),
            Self::Done | Self::Failed(_) => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running(_))
    }

    /// Check whether `from -> to` is an edge of the phase graph.
    pub fn is_valid_transition(from: PipelinePhase, to: PipelinePhase) -> bool {
        match (from, to) {
            (Self::Running(a), Self::Running(b)) => a.next() == Some(b),
            (Self::Running(Stage::Plan), Self::Done) => true,
            (Self::Running(a), Self::Failed(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running(stage) => write!(f, "running({stage})"),
            Self::Done => f.write_str("done"),
            Self::Failed(stage) => write!(f, "failed({stage})"),
        }
    }
}

/// A state change that is not an edge of the phase graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid pipeline transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: PipelinePhase,
    pub to: PipelinePhase,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// The validated output of a single stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Functions(Vec<String>),
    FailureModes(Vec<String>),
    Assessment(String),
    Tasks(Vec<MaintenanceTask>),
    Plan(String),
}

impl StageOutput {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Functions(_) => Stage::Functions,
            Self::FailureModes(_) => Stage::FailureModes,
            Self::Assessment(_) => Stage::Assessment,
            Self::Tasks(_) => Stage::Tasks,
            Self::Plan(_) => Stage::Plan,
        }
    }

    /// Short description for progress output, e.g. `"4 functions"`.
    pub fn summary(&self) -> String {
        match self {
            Self::Functions(items) => format!("{} functions", items.len()),
            Self::FailureModes(items) => format!("{} failure modes", items.len()),
            Self::Assessment(text) => format!("{} characters", text.chars().count()),
            Self::Tasks(tasks) => format!("{} tasks", tasks.len()),
            Self::Plan(text) => {
                format!("{} sections", crate::sections::split_sections(text).len())
            }
        }
    }
}

/// Outputs accumulated so far in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageResults {
    pub functions: Option<Vec<String>>,
    pub failure_modes: Option<Vec<String>>,
    pub assessment: Option<String>,
    pub tasks: Option<Vec<MaintenanceTask>>,
    pub plan: Option<String>,
}

impl StageResults {
    /// Whether an output has been recorded for `stage`.
    pub fn has(&self, stage: Stage) -> bool {
        match stage {
            Stage::Functions => self.functions.is_some(),
            Stage::FailureModes => self.failure_modes.is_some(),
            Stage::Assessment => self.assessment.is_some(),
            Stage::Tasks => self.tasks.is_some(),
            Stage::Plan => self.plan.is_some(),
        }
    }

    /// Stages with a recorded output, in execution order.
    pub fn completed_stages(&self) -> Vec<Stage> {
        Stage::ALL.into_iter().filter(|s| self.has(*s)).collect()
    }

    fn record(&mut self, output: StageOutput) {
        match output {
            StageOutput::Functions(v) => self.functions = Some(v),
            StageOutput::FailureModes(v) => self.failure_modes = Some(v),
            StageOutput::Assessment(v) => self.assessment = Some(v),
            StageOutput::Tasks(v) => self.tasks = Some(v),
            StageOutput::Plan(v) => self.plan = Some(v),
        }
    }
}

/// The stage that stopped a run and why.
#[derive(Debug, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    #[serde(serialize_with = "serialize_error")]
    pub error: PipelineError,
}

fn serialize_error<S: Serializer>(error: &PipelineError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.to_string())
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// State of a single pipeline run.
///
/// Created fresh for every run and mutated only through [`Self::complete`]
/// and [`Self::fail`], both of which enforce the phase graph.
#[derive(Debug, Serialize)]
pub struct PipelineState {
    pub run_id: Uuid,
    phase: PipelinePhase,
    results: StageResults,
    failure: Option<StageFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineState {
    /// Start a new run at the first stage.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            phase: PipelinePhase::Running(Stage::Functions),
            results: StageResults::default(),
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn current_stage(&self) -> Option<Stage> {
        self.phase.current_stage()
    }

    pub fn results(&self) -> &StageResults {
        &self.results
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.phase == PipelinePhase::Done
    }

    /// Record the output of the running stage and advance.
    ///
    /// Fails if the output does not belong to the running stage or the run
    /// has already terminated. Returns the new phase.
    pub fn complete(&mut self, output: StageOutput) -> Result<PipelinePhase, TransitionError> {
        let stage = output.stage();
        let next = match stage.next() {
            Some(next) => PipelinePhase::Running(next),
            None => PipelinePhase::Done,
        };

        if self.phase != PipelinePhase::Running(stage) {
            return Err(TransitionError {
                from: self.phase,
                to: next,
            });
        }
        self.transition(next)?;
        self.results.record(output);
        Ok(next)
    }

    /// Terminate the run at the running stage.
    ///
    /// Returns the failed stage. Results of earlier stages are kept.
    pub fn fail(&mut self, error: PipelineError) -> Result<Stage, TransitionError> {
        let stage = match self.phase {
            PipelinePhase::Running(stage) => stage,
            other => {
                return Err(TransitionError {
                    from: other,
                    to: PipelinePhase::Failed(error.stage().unwrap_or(Stage::Functions)),
                });
            }
        };
        self.transition(PipelinePhase::Failed(stage))?;
        self.failure = Some(StageFailure { stage, error });
        Ok(stage)
    }

    fn transition(&mut self, to: PipelinePhase) -> Result<(), TransitionError> {
        if !PipelinePhase::is_valid_transition(self.phase, to) {
            return Err(TransitionError {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_for(stage: Stage) -> StageOutput {
        match stage {
            Stage::Functions => StageOutput::Functions(vec!["Pump coolant".into()]),
            Stage::FailureModes => StageOutput::FailureModes(vec!["Seal leak".into()]),
            Stage::Assessment => StageOutput::Assessment("## Safety\nLow".into()),
            Stage::Tasks => StageOutput::Tasks(vec![MaintenanceTask {
                task: "Inspect seal".into(),
                task_type: "preventive".into(),
                frequency: "monthly".into(),
                explanation: "Catch leaks early".into(),
            }]),
            Stage::Plan => StageOutput::Plan("## Plan\nInspect".into()),
        }
    }

    #[test]
    fn stage_order_is_fixed() {
        assert_eq!(Stage::Functions.next(), Some(Stage::FailureModes));
        assert_eq!(Stage::FailureModes.next(), Some(Stage::Assessment));
        assert_eq!(Stage::Assessment.next(), Some(Stage::Tasks));
        assert_eq!(Stage::Tasks.next(), Some(Stage::Plan));
        assert_eq!(Stage::Plan.next(), None);
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn stage_display_roundtrip() {
        for stage in Stage::ALL {
            let parsed: Stage = stage.to_string().parse().unwrap();
            assert_eq!(parsed, stage);
        }
        assert!("bogus".parse::<Stage>().is_err());
    }

    #[test]
    fn valid_transitions_accepted() {
        use PipelinePhase::*;
        let valid = [
            (Running(Stage::Functions), Running(Stage::FailureModes)),
            (Running(Stage::FailureModes), Running(Stage::Assessment)),
            (Running(Stage::Assessment), Running(Stage::Tasks)),
            (Running(Stage::Tasks), Running(Stage::Plan)),
            (Running(Stage::Plan), Done),
            (Running(Stage::Tasks), Failed(Stage::Tasks)),
        ];
        for (from, to) in valid {
            assert!(
                PipelinePhase::is_valid_transition(from, to),
                "expected {from} -> {to} to be valid"
            );
        }
    }

    #[test]
    fn invalid_transitions_rejected() {
        use PipelinePhase::*;
        let invalid = [
            (Running(Stage::Functions), Running(Stage::Assessment)),
            (Running(Stage::Tasks), Running(Stage::FailureModes)),
            (Running(Stage::Tasks), Done),
            (Running(Stage::Tasks), Failed(Stage::Plan)),
            (Done, Running(Stage::Functions)),
            (Failed(Stage::Tasks), Running(Stage::Plan)),
            (Done, Failed(Stage::Plan)),
        ];
        for (from, to) in invalid {
            assert!(
                !PipelinePhase::is_valid_transition(from, to),
                "expected {from} -> {to} to be invalid"
            );
        }
    }

    #[test]
    fn complete_all_stages_reaches_done() {
        let mut state = PipelineState::new();
        assert_eq!(state.current_stage(), Some(Stage::Functions));

        for stage in Stage::ALL {
            state.complete(output_for(stage)).unwrap();
        }

        assert!(state.is_done());
        assert_eq!(state.current_stage(), None);
        assert_eq!(state.results().completed_stages(), Stage::ALL.to_vec());
        assert!(state.finished_at.is_some());
        assert!(state.failure().is_none());
    }

    #[test]
    fn complete_rejects_out_of_order_output() {
        let mut state = PipelineState::new();
        let err = state.complete(output_for(Stage::Assessment)).unwrap_err();
        assert_eq!(err.from, PipelinePhase::Running(Stage::Functions));
        assert_eq!(state.phase(), PipelinePhase::Running(Stage::Functions));
        assert!(!state.results().has(Stage::Assessment));
    }

    #[test]
    fn fail_keeps_partial_results() {
        let mut state = PipelineState::new();
        state.complete(output_for(Stage::Functions)).unwrap();

        let stage = state
            .fail(PipelineError::EmptyResult {
                stage: Stage::FailureModes,
            })
            .unwrap();

        assert_eq!(stage, Stage::FailureModes);
        assert_eq!(state.phase(), PipelinePhase::Failed(Stage::FailureModes));
        assert_eq!(state.results().completed_stages(), vec![Stage::Functions]);
        assert_eq!(state.failure().unwrap().stage, Stage::FailureModes);
        assert!(state.finished_at.is_some());
    }

    #[test]
    fn terminal_state_rejects_further_changes() {
        let mut state = PipelineState::new();
        state
            .fail(PipelineError::EmptyResult {
                stage: Stage::Functions,
            })
            .unwrap();

        assert!(state.complete(output_for(Stage::Functions)).is_err());
        assert!(
            state
                .fail(PipelineError::EmptyResult {
                    stage: Stage::Functions
                })
                .is_err()
        );
        assert_eq!(state.phase(), PipelinePhase::Failed(Stage::Functions));
    }

    #[test]
    fn phase_serializes_with_stage() {
        let json = serde_json::to_value(PipelinePhase::Failed(Stage::Tasks)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "stage": "tasks"}));
        let json = serde_json::to_value(PipelinePhase::Done).unwrap();
        assert_eq!(json, serde_json::json!({"status": "done"}));
    }
}
