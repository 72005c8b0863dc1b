//! Stage 11: discourse-mode classification.
//!
//! Tags each chunk with the rhetorical mode that dominates it. Marker
//! counts compete directly; Descriptive is the floor when nothing
//! scores. Ties break in a fixed precedence order so the same text
//! always classifies the same way.

use crate::capability::CapabilitySet;
use crate::models::DiscourseMode;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

const DIAGNOSTIC_MARKERS: &[&str] = &[
    "tasa de",
    "línea base",
    "situación actual",
    "según el diagnóstico",
    "déficit",
    "brecha",
    "actualmente",
    "baseline",
    "current rate",
];

const PRESCRIPTIVE_MARKERS: &[&str] = &[
    "se implementará",
    "se construirá",
    "se realizará",
    "deberá",
    "se adoptará",
    "se garantizará",
    "shall",
    "will implement",
];

const ARGUMENTATIVE_MARKERS: &[&str] = &[
    "porque",
    "debido a",
    "por lo tanto",
    "en consecuencia",
    "dado que",
    "esto implica",
    "therefore",
    "because",
];

const ASPIRATIONAL_MARKERS: &[&str] = &[
    "visión",
    "sueño",
    "aspiramos",
    "queremos un municipio",
    "territorio de paz",
    "futuro próspero",
    "we envision",
];

fn count_markers(lower: &str, markers: &[&str]) -> usize {
    markers.iter().map(|m| lower.matches(m).count()).sum()
}

/// Precedence on ties mirrors how plan text reads: a section that both
/// diagnoses and prescribes is read as diagnostic framing for the
/// prescription.
pub fn classify(text: &str) -> DiscourseMode {
    let lower = text.to_lowercase();
    let scored = [
        (DiscourseMode::Diagnostic, count_markers(&lower, DIAGNOSTIC_MARKERS)),
        (DiscourseMode::Prescriptive, count_markers(&lower, PRESCRIPTIVE_MARKERS)),
        (DiscourseMode::Argumentative, count_markers(&lower, ARGUMENTATIVE_MARKERS)),
        (DiscourseMode::Aspirational, count_markers(&lower, ASPIRATIONAL_MARKERS)),
    ];

    let mut best = (DiscourseMode::Descriptive, 0usize);
    for (mode, count) in scored {
        if count > best.1 {
            best = (mode, count);
        }
    }
    best.0
}

pub struct DiscourseAnalyzer;

impl Stage for DiscourseAnalyzer {
    fn name(&self) -> &'static str {
        "discourse_analyzer"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        for chunk in &mut ctx.chunks {
            if chunk.is_empty() {
                continue;
            }
            chunk.discourse = Some(classify(&chunk.text));
        }

        tracing::info!("Discourse classification complete");
        Ok(StageStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_text_classified() {
        let mode = classify("Según el diagnóstico, la tasa de deserción es del 12%.");
        assert_eq!(mode, DiscourseMode::Diagnostic);
    }

    #[test]
    fn prescriptive_text_classified() {
        let mode = classify("Se construirá un centro de salud y se implementará la ruta.");
        assert_eq!(mode, DiscourseMode::Prescriptive);
    }

    #[test]
    fn argumentative_text_classified() {
        let mode =
            classify("Porque la brecha persiste debido a la pobreza, por lo tanto se debe actuar.");
        assert_eq!(mode, DiscourseMode::Argumentative);
    }

    #[test]
    fn aspirational_text_classified() {
        let mode = classify("Nuestra visión: un territorio de paz con futuro próspero.");
        assert_eq!(mode, DiscourseMode::Aspirational);
    }

    #[test]
    fn plain_narrative_falls_back_to_descriptive() {
        let mode = classify("El municipio limita al norte con el río.");
        assert_eq!(mode, DiscourseMode::Descriptive);
    }

    #[test]
    fn tie_prefers_earlier_precedence() {
        // One diagnostic hit, one prescriptive hit.
        let mode = classify("La línea base es baja. Se realizará una medición.");
        assert_eq!(mode, DiscourseMode::Diagnostic);
    }
}
