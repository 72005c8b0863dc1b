//! Stage 3: text normalization.
//!
//! Line-oriented passes over the raw text: line endings, exotic spaces,
//! control characters, bullet markers, blank-line collapse. Structural
//! markers (headings, numbering) are preserved untouched for the
//! structural analyzer.

use crate::capability::CapabilitySet;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

/// Normalize extracted plan text.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<String> = Vec::new();
    for line in unified.lines() {
        let cleaned = clean_line(line);
        lines.push(cleaned);
    }

    collapse_blank_runs(&lines)
}

fn clean_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for ch in line.chars() {
        match ch {
            // Unicode spaces → plain space
            '\u{a0}' | '\u{2007}' | '\u{202f}' | '\u{2009}' | '\u{200a}' => out.push(' '),
            // Zero-width and control characters dropped (keep tab)
            '\u{200b}' | '\u{feff}' => {}
            c if c.is_control() && c != '\t' => {}
            c => out.push(c),
        }
    }

    let trimmed = out.trim_end();

    // Canonicalize bullet markers so the segmenter sees one list idiom.
    let stripped = trimmed.trim_start();
    for bullet in ["• ", "● ", "▪ ", "– ", "— ", "* "] {
        if let Some(rest) = stripped.strip_prefix(bullet) {
            return format!("- {rest}");
        }
    }

    trimmed.to_string()
}

/// At most one blank line between paragraphs.
fn collapse_blank_runs(lines: &[String]) -> String {
    let mut out = String::new();
    let mut blank_pending = false;
    let mut wrote_any = false;

    for line in lines {
        if line.trim().is_empty() {
            blank_pending = wrote_any;
            continue;
        }
        if blank_pending {
            out.push('\n');
            blank_pending = false;
        }
        out.push_str(line);
        out.push('\n');
        wrote_any = true;
    }

    out
}

pub struct Preprocessor;

impl Stage for Preprocessor {
    fn name(&self) -> &'static str {
        "preprocessor"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let raw = ctx
            .raw
            .as_ref()
            .ok_or_else(|| StageError::new("missing_input", "no raw document to normalize"))?;

        let normalized = normalize(&raw.text);
        tracing::debug!(
            raw_len = raw.text.len(),
            normalized_len = normalized.len(),
            "Text normalized"
        );
        ctx.normalized = Some(normalized);
        Ok(StageStatus::Completed)
    }
}
