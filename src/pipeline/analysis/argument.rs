//! Stage 9: argumentative scoring.
//!
//! Measures how strongly each chunk argues for its intervention:
//! necessity markers claim the action is required, sufficiency markers
//! claim it is enough. Both are normalized against chunk length so a
//! long diagnostic section does not outscore a short, dense argument.

use crate::capability::CapabilitySet;
use crate::models::ArgumentScores;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

const NECESSITY_MARKERS: &[&str] = &[
    "es necesario",
    "se requiere",
    "es indispensable",
    "es fundamental",
    "es prioritario",
    "debe garantizarse",
    "is necessary",
    "is required",
    "must",
];

const SUFFICIENCY_MARKERS: &[&str] = &[
    "es suficiente",
    "garantiza",
    "asegura",
    "permitirá alcanzar",
    "basta con",
    "ensures",
    "guarantees",
    "is sufficient",
];

/// Marker hits per 100 words, capped at 1.0.
fn marker_density(lower: &str, word_count: usize, markers: &[&str]) -> f32 {
    if word_count == 0 {
        return 0.0;
    }
    let hits: usize = markers.iter().map(|m| lower.matches(m).count()).sum();
    ((hits as f32 * 100.0) / word_count as f32).min(1.0)
}

pub fn score_text(text: &str) -> ArgumentScores {
    let lower = text.to_lowercase();
    let word_count = text.split_whitespace().count();

    let necessity = marker_density(&lower, word_count, NECESSITY_MARKERS);
    let sufficiency = marker_density(&lower, word_count, SUFFICIENCY_MARKERS);
    // Necessity carries more weight: plans argue need far more often
    // than they argue adequacy, and the rare sufficiency claim is
    // usually boilerplate.
    let strength = (necessity * 0.6 + sufficiency * 0.4).min(1.0);

    ArgumentScores {
        necessity,
        sufficiency,
        strength,
    }
}

pub struct ArgumentAnalyzer;

impl Stage for ArgumentAnalyzer {
    fn name(&self) -> &'static str {
        "argument_analyzer"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let mut scored = 0;
        for chunk in &mut ctx.chunks {
            if chunk.is_empty() {
                continue;
            }
            let scores = score_text(&chunk.text);
            if scores.strength > 0.0 {
                scored += 1;
            }
            chunk.argument = Some(scores);
        }

        tracing::info!(chunks_with_argument = scored, "Argument analysis complete");
        Ok(StageStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn necessity_markers_raise_necessity() {
        let scores = score_text("Es necesario ampliar la cobertura. Se requiere inversión.");
        assert!(scores.necessity > 0.0);
        assert_eq!(scores.sufficiency, 0.0);
        assert!(scores.strength > 0.0);
    }

    #[test]
    fn sufficiency_markers_raise_sufficiency() {
        let scores = score_text("La nueva planta garantiza el suministro de agua potable.");
        assert_eq!(scores.necessity, 0.0);
        assert!(scores.sufficiency > 0.0);
    }

    #[test]
    fn neutral_text_scores_zero() {
        let scores = score_text("El municipio cuenta con tres corregimientos.");
        assert_eq!(scores.strength, 0.0);
    }

    #[test]
    fn scores_stay_within_unit_interval() {
        let dense = "es necesario ".repeat(50) + &"garantiza ".repeat(50);
        let scores = score_text(&dense);
        assert!(scores.necessity <= 1.0);
        assert!(scores.sufficiency <= 1.0);
        assert!(scores.strength <= 1.0);
    }

    #[test]
    fn dense_argument_beats_diluted_one() {
        let dense = score_text("Es indispensable actuar ya.");
        let diluted =
            score_text(&format!("Es indispensable actuar. {}", "relleno ".repeat(200)));
        assert!(dense.necessity > diluted.necessity);
    }

    #[test]
    fn empty_text_scores_zero() {
        let scores = score_text("");
        assert_eq!(scores.necessity, 0.0);
        assert_eq!(scores.strength, 0.0);
    }
}
