//! `rcm sections`: split a saved plan into its level-2 heading sections.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use rcm_core::split_sections;

pub fn run_sections(path: &Path, json: bool, out: &mut dyn Write) -> Result<()> {
    let plan = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan file {}", path.display()))?;
    let sections = split_sections(&plan);

    if json {
        let text =
            serde_json::to_string_pretty(&sections).context("failed to serialize sections")?;
        writeln!(out, "{text}")?;
        return Ok(());
    }

    for (i, section) in sections.iter().enumerate() {
        let title = if section.title.is_empty() {
            "(untitled)"
        } else {
            section.title.as_str()
        };
        let lines = section.body.lines().count();
        writeln!(out, "{}. {title} ({lines} lines)", i + 1)?;
    }
    Ok(())
}
