use thiserror::Error;

use crate::generation::GenerationError;
use crate::pipeline::state::{Stage, TransitionError};

/// Errors raised by a pipeline stage.
///
/// A retrieval miss is not an error: the retriever reports it as
/// `found: false` and plan synthesis falls through to generic knowledge.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The generation call itself failed. Surfaced verbatim.
    #[error("{stage} generation failed: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: GenerationError,
    },

    /// Generation succeeded but produced nothing usable.
    #[error("{stage} stage returned an empty result")]
    EmptyResult { stage: Stage },

    /// A declared stage input was empty, so the stage was not started.
    #[error("{stage} stage cannot start: {input} is empty")]
    MissingInput { stage: Stage, input: &'static str },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl PipelineError {
    /// The stage the error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Generation { stage, .. }
            | Self::EmptyResult { stage }
            | Self::MissingInput { stage, .. } => Some(*stage),
            Self::Transition(_) => None,
        }
    }

    pub(crate) fn generation(stage: Stage) -> impl FnOnce(GenerationError) -> Self {
        move |source| Self::Generation { stage, source }
    }
}
