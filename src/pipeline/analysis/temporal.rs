//! Stage 10: temporal-marker extraction.
//!
//! Finds the time anchors a plan commits to: explicit years, planning
//! horizons, deadlines, and recurrence. Year markers keep the parsed
//! value so later consumers can order commitments chronologically.

use regex::Regex;

use crate::capability::CapabilitySet;
use crate::models::{TemporalKind, TemporalMarker};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

const HORIZON_MARKERS: &[&str] = &[
    "cuatrienio",
    "corto plazo",
    "mediano plazo",
    "largo plazo",
    "vigencia del plan",
    "short term",
    "long term",
];

const DEADLINE_MARKERS: &[&str] = &[
    "antes de",
    "a más tardar",
    "al finalizar",
    "no later than",
    "by the end of",
];

const FREQUENCY_MARKERS: &[&str] = &[
    "anual",
    "semestral",
    "trimestral",
    "mensual",
    "cada año",
    "annually",
    "quarterly",
];

pub fn extract_markers(text: &str) -> Vec<TemporalMarker> {
    let year_re = Regex::new(r"\b(19|20)\d{2}\b")
        .unwrap_or_else(|e| unreachable!("static pattern: {e}"));
    let lower = text.to_lowercase();
    let mut markers = Vec::new();

    for m in year_re.find_iter(text) {
        let year = m.as_str().parse::<i32>().ok();
        markers.push(TemporalMarker {
            kind: TemporalKind::Year,
            text: m.as_str().to_string(),
            year,
        });
    }

    for (list, kind) in [
        (HORIZON_MARKERS, TemporalKind::Horizon),
        (DEADLINE_MARKERS, TemporalKind::Deadline),
        (FREQUENCY_MARKERS, TemporalKind::Frequency),
    ] {
        for &marker in list {
            for _ in lower.matches(marker) {
                markers.push(TemporalMarker {
                    kind,
                    text: marker.to_string(),
                    year: None,
                });
            }
        }
    }

    markers
}

pub struct TemporalAnalyzer;

impl Stage for TemporalAnalyzer {
    fn name(&self) -> &'static str {
        "temporal_analyzer"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let mut total = 0;
        for chunk in &mut ctx.chunks {
            if chunk.is_empty() {
                continue;
            }
            chunk.temporal_markers = extract_markers(&chunk.text);
            total += chunk.temporal_markers.len();
        }

        tracing::info!(markers = total, "Temporal analysis complete");
        Ok(StageStatus::Completed)
    }
}
