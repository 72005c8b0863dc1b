//! Stage 12: strategic integration.
//!
//! Folds the analysis layers into two per-chunk boosts. The priority
//! boost rewards chunks whose cell vocabulary, causal evidence, and
//! argument all point the same way; the quality boost rewards breadth
//! of analysis coverage regardless of how strongly the text argues.

use crate::capability::CapabilitySet;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

/// Causal spans per 100 words, capped at 1.0.
fn causal_density(span_count: usize, word_count: usize) -> f32 {
    if word_count == 0 {
        return 0.0;
    }
    ((span_count as f32 * 100.0) / word_count as f32).min(1.0)
}

pub struct StrategicIntegrator;

impl Stage for StrategicIntegrator {
    fn name(&self) -> &'static str {
        "strategic_integrator"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let (pack, degraded) = caps.effective_signals();

        for chunk in &mut ctx.chunks {
            if chunk.is_empty() {
                continue;
            }

            let word_count = chunk.text.split_whitespace().count();
            let lower = chunk.text.to_lowercase();

            let signal_hit_ratio = {
                let entries = pack.entries(&chunk.cell);
                if entries.is_empty() {
                    0.0
                } else {
                    let hits = entries
                        .iter()
                        .filter(|e| lower.contains(&e.keyword.to_lowercase()))
                        .count();
                    hits as f32 / entries.len() as f32
                }
            };

            let density = causal_density(chunk.causal_spans.len(), word_count);
            let strength = chunk.argument.as_ref().map(|a| a.strength).unwrap_or(0.0);

            chunk.priority_boost =
                (signal_hit_ratio * 0.4 + density * 0.35 + strength * 0.25).min(1.0);

            // Quality asks "how much did we learn about this chunk",
            // not "how urgent is it".
            let mut covered = 0u8;
            if !chunk.matched_keywords.is_empty() {
                covered += 1;
            }
            if !chunk.causal_spans.is_empty() {
                covered += 1;
            }
            if chunk.argument.as_ref().is_some_and(|a| a.strength > 0.0) {
                covered += 1;
            }
            if !chunk.temporal_markers.is_empty() {
                covered += 1;
            }
            if chunk.discourse.is_some() {
                covered += 1;
            }
            chunk.quality_boost = covered as f32 / 5.0;
        }

        if degraded {
            ctx.record_degraded(self.name());
            Ok(StageStatus::Degraded {
                reason: "signal pack unavailable, builtin vocabulary used for priority".into(),
            })
        } else {
            Ok(StageStatus::Completed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Dimension, GridCell, PolicyArea};
    use crate::models::{ArgumentScores, CausalRole, CausalSpan, Chunk, DiscourseMode};

    fn chunk(text: &str) -> Chunk {
        let mut c = Chunk::placeholder(GridCell::new(PolicyArea::Health, Dimension::Diagnostic));
        c.text = text.to_string();
        c
    }

    fn run_on(chunks: Vec<Chunk>) -> Vec<Chunk> {
        let mut ctx = PipelineContext::new("run-si-0001", 3);
        ctx.chunks = chunks;
        let caps = CapabilitySet::probe(None);
        let _ = StrategicIntegrator.run(&mut ctx, &caps).unwrap();
        ctx.chunks
    }

    #[test]
    fn rich_chunk_outranks_plain_chunk() {
        let mut rich = chunk("La tasa de mortalidad infantil bajó debido a la vacunación en salud.");
        rich.matched_keywords = vec!["salud".into(), "tasa".into()];
        rich.causal_spans = vec![CausalSpan {
            marker: "debido a".into(),
            text: "bajó debido a la vacunación".into(),
            role: CausalRole::Cause,
            offset: 0,
            weight: 1.0,
        }];
        rich.argument = Some(ArgumentScores {
            necessity: 0.5,
            sufficiency: 0.0,
            strength: 0.3,
        });

        let plain = chunk("El municipio cuenta con tres puestos de atención.");

        let out = run_on(vec![rich, plain]);
        assert!(out[0].priority_boost > out[1].priority_boost);
    }

    #[test]
    fn quality_counts_analysis_coverage() {
        let mut full = chunk("texto");
        full.matched_keywords = vec!["salud".into()];
        full.causal_spans = vec![CausalSpan {
            marker: "porque".into(),
            text: "porque sí".into(),
            role: CausalRole::Cause,
            offset: 0,
            weight: 1.0,
        }];
        full.argument = Some(ArgumentScores {
            necessity: 1.0,
            sufficiency: 0.0,
            strength: 0.6,
        });
        full.temporal_markers = vec![crate::models::TemporalMarker {
            kind: crate::models::TemporalKind::Year,
            text: "2027".into(),
            year: Some(2027),
        }];
        full.discourse = Some(DiscourseMode::Diagnostic);

        let out = run_on(vec![full]);
        assert!((out[0].quality_boost - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_chunk_keeps_zero_boosts() {
        let out = run_on(vec![chunk("")]);
        assert_eq!(out[0].priority_boost, 0.0);
        assert_eq!(out[0].quality_boost, 0.0);
    }

    #[test]
    fn boosts_stay_within_unit_interval() {
        let mut c = chunk(&"salud hospital vacunación mortalidad porque ".repeat(20));
        c.argument = Some(ArgumentScores {
            necessity: 1.0,
            sufficiency: 1.0,
            strength: 1.0,
        });
        c.causal_spans = (0..200)
            .map(|i| CausalSpan {
                marker: "porque".into(),
                text: "porque sí".into(),
                role: CausalRole::Cause,
                offset: i,
                weight: 1.0,
            })
            .collect();
        let out = run_on(vec![c]);
        assert!(out[0].priority_boost <= 1.0);
        assert!(out[0].quality_boost <= 1.0);
    }
}
