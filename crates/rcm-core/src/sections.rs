//! Splitting a markdown plan into level-2 sections.

use serde::Serialize;

/// One `## ` section of a plan. The leading section has an empty title when
/// the plan has text before its first heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSection {
    pub title: String,
    pub body: String,
}

/// Split `plan` at every level-2 heading line (`## Title`, `##\tTitle`).
///
/// Text before the first heading becomes an untitled section if it is not
/// blank. A plan without headings is returned as a single untitled section.
pub fn split_sections(plan: &str) -> Vec<PlanSection> {
    let mut sections = Vec::new();
    let mut title: Option<String> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in plan.lines() {
        if let Some(heading) = heading_text(line) {
            push_section(&mut sections, title.take(), &body);
            title = Some(heading.to_string());
            body.clear();
        } else {
            body.push(line);
        }
    }
    push_section(&mut sections, title, &body);

    if sections.is_empty() {
        sections.push(PlanSection {
            title: String::new(),
            body: plan.trim().to_string(),
        });
    }
    sections
}

/// Title of a level-2 heading line: `##` followed by whitespace (a space or
/// a tab) or by the end of the line.
fn heading_text(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("##")?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn push_section(sections: &mut Vec<PlanSection>, title: Option<String>, body: &[&str]) {
    let body = body.join("\n").trim().to_string();
    match title {
        Some(title) => sections.push(PlanSection { title, body }),
        None if !body.is_empty() => sections.push(PlanSection {
            title: String::new(),
            body,
        }),
        None => {}
    }
}
