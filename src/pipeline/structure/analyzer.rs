//! Stage 4: structural analysis into headings and sections.
//!
//! Splits the normalized text into titled sections. Recognizes the
//! heading idioms found in municipal plans: markdown hashes, chapter and
//! article labels, decimal numbering, and short all-caps lines. A
//! document without recognizable headings becomes one untitled section.

use crate::capability::CapabilitySet;
use crate::pipeline::context::{PipelineContext, Section};
use crate::pipeline::{Stage, StageError, StageStatus};

/// True when a line reads as a section heading.
fn is_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.len() > 120 {
        return false;
    }

    if trimmed.starts_with('#') {
        return true;
    }

    let upper = trimmed.to_uppercase();
    for marker in ["CAPÍTULO", "CAPITULO", "ARTÍCULO", "ARTICULO", "TÍTULO", "TITULO", "EJE ", "SECTOR "] {
        if upper.starts_with(marker) {
            return true;
        }
    }

    // Decimal numbering: "1.", "2.3", "4.1.2" followed by a title.
    if decimal_numbered(trimmed) {
        return true;
    }

    all_caps_title(trimmed)
}

fn decimal_numbered(line: &str) -> bool {
    let mut chars = line.chars().peekable();
    let mut saw_digit = false;
    let mut saw_dot = false;
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            saw_digit = true;
            chars.next();
        } else if c == '.' {
            saw_dot = true;
            chars.next();
        } else {
            break;
        }
    }
    // Needs a numeric prefix with a dot and a textual remainder.
    let rest: String = chars.collect();
    saw_digit && saw_dot && rest.trim().chars().any(|c| c.is_alphabetic())
}

/// Short line, mostly uppercase letters, no trailing period.
fn all_caps_title(line: &str) -> bool {
    if line.len() > 80 || line.ends_with('.') {
        return false;
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < 4 {
        return false;
    }
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    upper as f32 / letters.len() as f32 >= 0.9
}

fn heading_title(line: &str) -> String {
    line.trim().trim_start_matches('#').trim().to_string()
}

/// Split normalized text into sections with byte offsets.
pub fn split_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current_title: Option<String> = None;
    let mut current_body = String::new();
    let mut body_offset = 0usize;
    let mut pos = 0usize;

    for line in text.lines() {
        let line_len = line.len() + 1;
        if is_heading(line) {
            if !current_body.trim().is_empty() {
                sections.push(Section {
                    title: current_title.take(),
                    text: current_body.trim().to_string(),
                    offset: body_offset,
                });
            }
            current_title = Some(heading_title(line));
            current_body = String::new();
            body_offset = pos + line_len;
        } else {
            current_body.push_str(line);
            current_body.push('\n');
        }
        pos += line_len;
    }

    if !current_body.trim().is_empty() {
        sections.push(Section {
            title: current_title,
            text: current_body.trim().to_string(),
            offset: body_offset,
        });
    }

    sections
}

pub struct StructuralAnalyzer;

impl Stage for StructuralAnalyzer {
    fn name(&self) -> &'static str {
        "structural_analyzer"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let normalized = ctx
            .normalized
            .as_ref()
            .ok_or_else(|| StageError::new("missing_input", "no normalized text"))?;

        let sections = split_sections(normalized);
        tracing::info!(sections = sections.len(), "Structural analysis complete");
        ctx.sections = sections;
        Ok(StageStatus::Completed)
    }
}
