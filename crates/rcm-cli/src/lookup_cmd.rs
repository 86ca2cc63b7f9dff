//! `rcm lookup`: query the maintenance knowledge base directly.

use std::io::Write;

use anyhow::{Context, Result};

use rcm_core::{DocumentRetriever, RetrievalResult};

/// Print the manual matching `identifier`. A miss is reported, not an error.
pub fn run_lookup(
    retriever: &DocumentRetriever,
    identifier: &str,
    json: bool,
    out: &mut dyn Write,
) -> Result<RetrievalResult> {
    let result = retriever.retrieve(identifier);

    if json {
        let text = serde_json::to_string_pretty(&result).context("failed to serialize result")?;
        writeln!(out, "{text}")?;
        return Ok(result);
    }

    match (&result.document_name, &result.relevant_excerpts) {
        (Some(name), excerpts) if result.found => {
            writeln!(out, "Document: {name}")?;
            if let Some(excerpts) = excerpts {
                writeln!(out)?;
                writeln!(out, "{}", excerpts.trim())?;
            }
        }
        _ => writeln!(out, "No maintenance document found for {identifier}.")?,
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(identifier: &str, json: bool) -> (RetrievalResult, String) {
        let mut out = Vec::new();
        let result = run_lookup(&DocumentRetriever::builtin(), identifier, json, &mut out).unwrap();
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn hit_prints_document_and_excerpts() {
        let (result, text) = lookup("PMP-001-EAST", false);
        assert!(result.found);
        assert!(text.starts_with("Document: KSB-001 Centrifugal Pump Manual.pdf\n\n"));
        assert!(text.contains("4.5 mm/s"));
    }

    #[test]
    fn miss_is_reported() {
        let (result, text) = lookup("UNKNOWN-999", false);
        assert!(!result.found);
        assert_eq!(text, "No maintenance document found for UNKNOWN-999.\n");
    }

    #[test]
    fn json_output_matches_tool_shape() {
        let (_, text) = lookup("MOTOR-ELET-01", true);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["found"], true);
        assert_eq!(value["documentName"], "WEG W22 Electric Motor Manual.pdf");
    }
}
