//! `rcm run`: execute the pipeline for one piece of equipment.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use rcm_core::generation::{ClaudeCliGenerator, StructuredGenerator};
use rcm_core::pipeline::PipelinePhase;
use rcm_core::{
    DocumentRetriever, EquipmentDescriptor, Orchestrator, PipelineEvent, PipelineState,
    ReferenceMaterial, Stage,
};

use crate::config::RcmConfig;

/// Arguments of `rcm run`, as parsed by clap.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub tag: String,
    pub description: String,
    pub reference_text: Option<String>,
    pub reference_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

/// How a run ended, for the caller to turn into an exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed { stage: Stage, reason: String },
}

// -----------------------------------------------------------------------
// Entry point
// -----------------------------------------------------------------------

pub async fn run_pipeline(config: &RcmConfig, args: &RunArgs) -> Result<RunOutcome> {
    let descriptor = build_descriptor(args)?;
    let kb = config.load_knowledge_base()?;

    let generator: Arc<dyn StructuredGenerator> =
        Arc::new(ClaudeCliGenerator::new(config.generator.clone()));
    let orchestrator = Orchestrator::new(generator, Arc::new(DocumentRetriever::new(kb)));

    let state = execute(orchestrator, &descriptor).await;
    report(&state, args, &mut std::io::stdout().lock())
}

/// Run the pipeline, printing progress to stderr as stages start and finish.
pub async fn execute(orchestrator: Orchestrator, descriptor: &EquipmentDescriptor) -> PipelineState {
    let (tx, mut rx) = mpsc::channel(16);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(line) = progress_line(&event) {
                eprintln!("{line}");
            }
        }
    });

    let state = orchestrator.with_events(tx).run(descriptor).await;

    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "progress printer stopped");
    }
    state
}

// -----------------------------------------------------------------------
// Input
// -----------------------------------------------------------------------

/// Validate the operator input and load any reference material.
pub fn build_descriptor(args: &RunArgs) -> Result<EquipmentDescriptor> {
    let reference = load_reference(args.reference_text.as_deref(), args.reference_file.as_deref())?;
    EquipmentDescriptor::new(&args.tag, &args.description, reference)
        .context("invalid equipment description")
}

fn load_reference(text: Option<&str>, file: Option<&Path>) -> Result<Option<ReferenceMaterial>> {
    if let Some(text) = text {
        return Ok(ReferenceMaterial::parse(text));
    }
    let Some(path) = file else {
        return Ok(None);
    };

    if let Some(media_type) = image_media_type(path) {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read reference image {}", path.display()))?;
        return Ok(Some(ReferenceMaterial::image_from_bytes(media_type, &bytes)));
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read reference file {}", path.display()))?;
    Ok(ReferenceMaterial::parse(&contents))
}

/// Image type implied by the file extension, or `None` for text.
fn image_media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

// -----------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------

fn progress_line(event: &PipelineEvent) -> Option<String> {
    let (stage, status) = match event {
        PipelineEvent::StageStarted { stage, .. } => (*stage, "running".to_string()),
        PipelineEvent::StageCompleted { stage, summary, .. } => (*stage, summary.clone()),
        PipelineEvent::StageFailed { stage, reason, .. } => (*stage, format!("failed ({reason})")),
        PipelineEvent::Finished { .. } => return None,
    };
    Some(format!(
        "[{}/{}] {}: {status}",
        stage.index() + 1,
        Stage::ALL.len(),
        stage.title()
    ))
}

/// Write the result of a run to `out` (or to `--output`).
///
/// With `--json` the whole run state is printed, whether it succeeded or
/// not. Otherwise a completed run prints or saves the plan.
pub fn report(state: &PipelineState, args: &RunArgs, out: &mut dyn Write) -> Result<RunOutcome> {
    if args.json {
        let json = serde_json::to_string_pretty(state).context("failed to serialize run state")?;
        writeln!(out, "{json}")?;
    }

    if let PipelinePhase::Failed(stage) = state.phase() {
        let reason = state
            .failure()
            .map(|f| f.error.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        return Ok(RunOutcome::Failed { stage, reason });
    }

    let plan = state.results().plan.as_deref().unwrap_or_default();
    match &args.output {
        Some(path) => {
            std::fs::write(path, plan)
                .with_context(|| format!("failed to write plan to {}", path.display()))?;
            if !args.json {
                writeln!(out, "Plan written to {}", path.display())?;
            }
        }
        None if !args.json => writeln!(out, "{plan}")?,
        None => {}
    }
    Ok(RunOutcome::Completed)
}
