//! Pipeline orchestrator: runs the five stages in order for one piece of
//! equipment and records the outcome in a fresh [`PipelineState`].

pub mod state;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use state::{
    PipelinePhase, PipelineState, Stage, StageFailure, StageOutput, StageParseError,
    StageResults, TransitionError,
};

use crate::equipment::EquipmentDescriptor;
use crate::error::PipelineError;
use crate::generation::StructuredGenerator;
use crate::retrieval::DocumentRetriever;
use crate::stages::{
    PlanInput, assess_consequences, derive_failure_modes, identify_functions, suggest_tasks,
    synthesize_plan,
};

/// Progress notification emitted while a run executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageStarted {
        run_id: Uuid,
        stage: Stage,
    },
    StageCompleted {
        run_id: Uuid,
        stage: Stage,
        summary: String,
    },
    StageFailed {
        run_id: Uuid,
        stage: Stage,
        reason: String,
    },
    Finished {
        run_id: Uuid,
        phase: PipelinePhase,
    },
}

/// Drives pipeline runs.
///
/// The generator and retriever are shared read-only, so one orchestrator
/// can serve any number of concurrent runs.
#[derive(Clone)]
pub struct Orchestrator {
    generator: Arc<dyn StructuredGenerator>,
    retriever: Arc<DocumentRetriever>,
    events: Option<mpsc::Sender<PipelineEvent>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("generator", &self.generator.name())
            .field("knowledge_base_entries", &self.retriever.knowledge_base().len())
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(generator: Arc<dyn StructuredGenerator>, retriever: Arc<DocumentRetriever>) -> Self {
        Self {
            generator,
            retriever,
            events: None,
        }
    }

    /// Send progress events to `tx`. A closed receiver is ignored.
    pub fn with_events(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Run every stage for `descriptor`.
    ///
    /// Stage failures do not surface as `Err`: the returned state is
    /// `Failed(stage)` with the error recorded and earlier results intact.
    pub async fn run(&self, descriptor: &EquipmentDescriptor) -> PipelineState {
        let mut state = PipelineState::new();
        let run_id = state.run_id;
        tracing::info!(
            run_id = %run_id,
            tag = descriptor.tag(),
            generator = self.generator.name(),
            "pipeline started"
        );

        if let Err(error) = self.drive(descriptor, &mut state).await {
            let reason = error.to_string();
            match state.fail(error) {
                Ok(stage) => {
                    tracing::warn!(run_id = %run_id, stage = %stage, error = %reason, "stage failed");
                    self.emit(PipelineEvent::StageFailed {
                        run_id,
                        stage,
                        reason,
                    })
                    .await;
                }
                Err(e) => {
                    tracing::error!(run_id = %run_id, error = %e, "could not record stage failure");
                }
            }
        }

        let phase = state.phase();
        tracing::info!(run_id = %run_id, phase = %phase, "pipeline finished");
        self.emit(PipelineEvent::Finished { run_id, phase }).await;
        state
    }

    async fn drive(
        &self,
        descriptor: &EquipmentDescriptor,
        state: &mut PipelineState,
    ) -> Result<(), PipelineError> {
        let generator = self.generator.as_ref();
        let tag = descriptor.tag();

        self.begin(state, Stage::Functions).await;
        let functions = identify_functions(generator, tag, descriptor.description()).await?;
        self.record(state, StageOutput::Functions(functions.clone()))
            .await?;

        self.begin(state, Stage::FailureModes).await;
        let failure_modes = derive_failure_modes(generator, tag, &functions).await?;
        self.record(state, StageOutput::FailureModes(failure_modes.clone()))
            .await?;

        self.begin(state, Stage::Assessment).await;
        let assessment = assess_consequences(generator, &failure_modes).await?;
        self.record(state, StageOutput::Assessment(assessment.clone()))
            .await?;

        self.begin(state, Stage::Tasks).await;
        let tasks = suggest_tasks(generator, tag, &failure_modes).await?;
        self.record(state, StageOutput::Tasks(tasks.clone())).await?;

        self.begin(state, Stage::Plan).await;
        let input = PlanInput {
            descriptor,
            functions: &functions,
            failure_modes: &failure_modes,
            assessment: &assessment,
            tasks: Some(&tasks),
        };
        let plan = synthesize_plan(generator, Arc::clone(&self.retriever), &input).await?;
        self.record(state, StageOutput::Plan(plan)).await?;

        Ok(())
    }

    async fn begin(&self, state: &PipelineState, stage: Stage) {
        tracing::info!(run_id = %state.run_id, stage = %stage, "stage started");
        self.emit(PipelineEvent::StageStarted {
            run_id: state.run_id,
            stage,
        })
        .await;
    }

    async fn record(
        &self,
        state: &mut PipelineState,
        output: StageOutput,
    ) -> Result<(), PipelineError> {
        let stage = output.stage();
        let summary = output.summary();
        state.complete(output)?;
        tracing::info!(run_id = %state.run_id, stage = %stage, summary = %summary, "stage completed");
        self.emit(PipelineEvent::StageCompleted {
            run_id: state.run_id,
            stage,
            summary,
        })
        .await;
        Ok(())
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).await.is_err() {
                tracing::debug!("event receiver dropped");
            }
        }
    }
}
