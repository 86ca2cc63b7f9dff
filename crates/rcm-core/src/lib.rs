//! Core of the RCM maintenance planner.
//!
//! Turns a short equipment description into a maintenance plan through five
//! structured-generation stages:
//!
//! ```text
//! EquipmentDescriptor
//!     |
//!     v
//! identify_functions ----> FunctionList
//!     |
//! derive_failure_modes --> FailureModeList
//!     |
//! assess_consequences ---> ConsequenceAssessment
//!     |
//! suggest_tasks ---------> TaskList
//!     |
//! synthesize_plan -------> MaintenancePlan  (+ maintenance_document_retriever tool)
//! ```
//!
//! The [`pipeline::Orchestrator`] threads the outputs through the stages and
//! owns the per-run [`pipeline::PipelineState`]. The model itself sits behind
//! the [`generation::StructuredGenerator`] trait.

pub mod equipment;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod retrieval;
pub mod sections;
pub mod stages;

pub use equipment::{DescriptorError, EquipmentDescriptor, ReferenceMaterial};
pub use error::PipelineError;
pub use pipeline::{Orchestrator, PipelineEvent, PipelinePhase, PipelineState, Stage};
pub use retrieval::{DocumentRetriever, KnowledgeBase, RetrievalResult};
pub use sections::{PlanSection, split_sections};
pub use stages::{MaintenanceTask, TaskKind};
