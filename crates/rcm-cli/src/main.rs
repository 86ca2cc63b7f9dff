mod config;
mod lookup_cmd;
mod run_cmd;
mod sections_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rcm_core::DocumentRetriever;

use config::{CliOverrides, RcmConfig};
use run_cmd::{RunArgs, RunOutcome};

#[derive(Parser)]
#[command(name = "rcm", about = "Generate RCM maintenance plans for industrial equipment")]
struct Cli {
    /// Path to the claude executable (overrides RCM_CLAUDE_BIN)
    #[arg(long, global = true)]
    claude_bin: Option<String>,

    /// Model passed to the claude CLI (overrides RCM_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// TOML catalog of maintenance manuals (overrides RCM_KNOWLEDGE_BASE)
    #[arg(long, global = true)]
    knowledge_base: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default rcm config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Run the five-stage pipeline and produce a maintenance plan
    Run {
        /// Equipment tag, e.g. PMP-001
        #[arg(long)]
        tag: String,
        /// Free-text description of the equipment
        #[arg(long)]
        description: String,
        /// Reference material: plain text or a data:image/...;base64 URI
        #[arg(long, conflicts_with = "reference_file")]
        reference_text: Option<String>,
        /// Reference material file (png/jpg/gif/webp are sent as images)
        #[arg(long)]
        reference_file: Option<PathBuf>,
        /// Write the plan to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Print the full run state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up the maintenance manual for an equipment identifier
    Lookup {
        identifier: String,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Split a saved plan into its sections
    Sections {
        plan_file: PathBuf,
        /// Print the sections as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute the `rcm init` command: write config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile::default();
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  generator.binary = {}", cfg.generator.binary);
    println!("  generator.timeout_secs = {}", cfg.generator.timeout_secs);
    println!("  generator.max_tool_rounds = {}", cfg.generator.max_tool_rounds);
    println!();
    println!("Set knowledge_base.path to use your own manual catalog.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = CliOverrides {
        claude_bin: cli.claude_bin.as_deref(),
        model: cli.model.as_deref(),
        knowledge_base: cli.knowledge_base.as_deref(),
    };

    match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
        }
        Commands::Run {
            tag,
            description,
            reference_text,
            reference_file,
            output,
            json,
        } => {
            let resolved = RcmConfig::resolve(overrides)?;
            let args = RunArgs {
                tag,
                description,
                reference_text,
                reference_file,
                output,
                json,
            };
            match run_cmd::run_pipeline(&resolved, &args).await {
                Ok(RunOutcome::Completed) => {}
                Ok(RunOutcome::Failed { stage, reason }) => {
                    eprintln!("stage {stage} failed: {reason}");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("{e:#}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Lookup { identifier, json } => {
            let resolved = RcmConfig::resolve(overrides)?;
            let retriever = DocumentRetriever::new(resolved.load_knowledge_base()?);
            lookup_cmd::run_lookup(&retriever, &identifier, json, &mut std::io::stdout().lock())?;
        }
        Commands::Sections { plan_file, json } => {
            sections_cmd::run_sections(&plan_file, json, &mut std::io::stdout().lock())?;
        }
    }

    Ok(())
}
