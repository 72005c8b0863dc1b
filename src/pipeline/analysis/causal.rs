//! Stages 7-8: causal-marker extraction and cross-chunk integration.
//!
//! The extractor finds cause/effect marker spans inside each chunk,
//! weighted by the cell's signal vocabulary when available. The
//! integrator links spans across chunks into ordered chains; a chain
//! that loops back onto a visited chunk is kept but flagged as
//! contradiction evidence, never silently dropped.

use std::collections::BTreeSet;

use crate::capability::CapabilitySet;
use crate::models::{CausalChain, CausalRole, CausalSpan, ChainSegment};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

/// Cause markers: the clause names a driver or precondition.
const CAUSE_MARKERS: &[&str] = &[
    "porque",
    "debido a",
    "a causa de",
    "dado que",
    "como consecuencia de",
    "because",
    "due to",
    "as a result of",
];

/// Effect markers: the clause names a consequence or purpose.
const EFFECT_MARKERS: &[&str] = &[
    "por lo tanto",
    "con el fin de",
    "para lograr",
    "lo que genera",
    "contribuye a",
    "permitirá",
    "resulta en",
    "therefore",
    "in order to",
    "leads to",
    "contributes to",
];

/// Lowercased copy of `text` plus, per byte of the copy, the byte
/// offset of the originating character. Lowercasing can change byte
/// lengths (U+0130 grows from two bytes to three), so marker offsets
/// found in the copy must be mapped back before slicing the original.
fn lowered_with_offsets(text: &str) -> (String, Vec<usize>) {
    let mut lower = String::with_capacity(text.len());
    let mut offsets = Vec::with_capacity(text.len());
    for (at, c) in text.char_indices() {
        for lc in c.to_lowercase() {
            lower.push(lc);
            while offsets.len() < lower.len() {
                offsets.push(at);
            }
        }
    }
    (lower, offsets)
}

/// Sentence containing a byte offset, trimmed and whitespace-collapsed.
fn sentence_around(text: &str, offset: usize) -> String {
    let start = text[..offset]
        .rfind(['.', '\n'])
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = text[offset..]
        .find(['.', '\n'])
        .map(|i| offset + i)
        .unwrap_or(text.len());
    text[start..end].split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find marker spans in one chunk's text.
pub fn extract_spans(text: &str, signal_weight: f32) -> Vec<CausalSpan> {
    let (lower, offsets) = lowered_with_offsets(text);
    let mut spans = Vec::new();

    for (markers, role) in [
        (CAUSE_MARKERS, CausalRole::Cause),
        (EFFECT_MARKERS, CausalRole::Effect),
    ] {
        for &marker in markers {
            let mut search_from = 0;
            while let Some(found) = lower[search_from..].find(marker) {
                let lowered_at = search_from + found;
                // Char-boundary offset in the original text.
                let offset = offsets[lowered_at];
                spans.push(CausalSpan {
                    marker: marker.to_string(),
                    text: sentence_around(text, offset),
                    role,
                    offset,
                    weight: 1.0 + signal_weight,
                });
                search_from = lowered_at + marker.len();
            }
        }
    }

    spans.sort_by_key(|s| (s.offset, s.marker.clone()));
    spans
}

pub struct CausalExtractor;

impl Stage for CausalExtractor {
    fn name(&self) -> &'static str {
        "causal_extractor"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let (pack, degraded) = caps.effective_signals();

        let mut total_spans = 0;
        for chunk in &mut ctx.chunks {
            if chunk.is_empty() {
                continue;
            }

            // A chunk rich in its own cell vocabulary gets slightly
            // heavier causal spans: evidence in context beats evidence
            // in passing.
            let lower = chunk.text.to_lowercase();
            let signal_weight = pack
                .entries(&chunk.cell)
                .iter()
                .filter(|e| lower.contains(&e.keyword.to_lowercase()))
                .map(|e| e.weight)
                .sum::<f32>()
                .min(1.0);

            chunk.causal_spans = extract_spans(&chunk.text, signal_weight);
            chunk.capability_degraded |= degraded && !chunk.causal_spans.is_empty();
            total_spans += chunk.causal_spans.len();
        }

        tracing::info!(spans = total_spans, "Causal extraction complete");

        if degraded {
            ctx.record_degraded(self.name());
            Ok(StageStatus::Degraded {
                reason: "signal pack unavailable, unweighted builtin markers used".into(),
            })
        } else {
            Ok(StageStatus::Completed)
        }
    }
}

// ---------------------------------------------------------------------------
// Integration
// ---------------------------------------------------------------------------

/// Content words of a span, for effect→cause matching.
fn content_words(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(|w| w.to_string())
        .collect()
}

/// Number of shared content words required to treat an effect span in
/// one chunk as the cause context of another.
const LINK_WORD_OVERLAP: usize = 2;

pub struct CausalIntegrator;

impl CausalIntegrator {
    /// Direct links: effect span of `a` shares vocabulary with a cause
    /// span of `b`. Iterated in ascending chunk-id order for stable
    /// chain ids.
    fn build_edges(ctx: &PipelineContext) -> Vec<(usize, usize, usize, usize)> {
        let mut edges = Vec::new();

        for (ai, a) in ctx.chunks.iter().enumerate() {
            for (asi, a_span) in a.causal_spans.iter().enumerate() {
                if a_span.role != CausalRole::Effect {
                    continue;
                }
                let a_words = content_words(&a_span.text);

                for (bi, b) in ctx.chunks.iter().enumerate() {
                    if ai == bi {
                        continue;
                    }
                    for (bsi, b_span) in b.causal_spans.iter().enumerate() {
                        if b_span.role != CausalRole::Cause {
                            continue;
                        }
                        let overlap = content_words(&b_span.text)
                            .intersection(&a_words)
                            .count();
                        if overlap >= LINK_WORD_OVERLAP {
                            edges.push((ai, asi, bi, bsi));
                        }
                    }
                }
            }
        }

        edges
    }
}

impl Stage for CausalIntegrator {
    fn name(&self) -> &'static str {
        "causal_integrator"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let edges = Self::build_edges(ctx);

        let mut chains: Vec<CausalChain> = Vec::new();
        // Chain roots: chunks that link out but are never linked into.
        // A pure cycle has no root, so a second pass picks up whatever
        // the first pass never reached.
        let targets: BTreeSet<usize> = edges.iter().map(|e| e.2).collect();
        let mut covered: BTreeSet<usize> = BTreeSet::new();

        for pass_roots_only in [true, false] {
            for ai in 0..ctx.chunks.len() {
                if covered.contains(&ai) || (pass_roots_only && targets.contains(&ai)) {
                    continue;
                }
                let Some(first_edge) = edges.iter().find(|e| e.0 == ai) else {
                    continue;
                };

                let mut segments = vec![ChainSegment {
                    chunk_id: ctx.chunks[ai].chunk_id.clone(),
                    span_index: first_edge.1,
                }];
                let mut visited: BTreeSet<usize> = BTreeSet::from([ai]);
                let mut contradiction = false;
                let mut current = ai;

                loop {
                    let Some(edge) = edges.iter().find(|e| e.0 == current) else {
                        break;
                    };
                    let next = edge.2;
                    segments.push(ChainSegment {
                        chunk_id: ctx.chunks[next].chunk_id.clone(),
                        span_index: edge.3,
                    });
                    if !visited.insert(next) {
                        // Revisiting a chunk: cycle. Keep the chain as
                        // contradiction evidence and stop walking.
                        contradiction = true;
                        break;
                    }
                    current = next;
                }

                if segments.len() > 1 {
                    covered.extend(visited.iter());
                    chains.push(CausalChain {
                        chain_id: format!("CC-{:03}", chains.len() + 1),
                        segments,
                        contradiction_evidence: contradiction,
                    });
                }
            }
        }

        tracing::info!(
            chains = chains.len(),
            contradictions = chains.iter().filter(|c| c.contradiction_evidence).count(),
            "Causal integration complete"
        );

        ctx.causal_chains = chains;
        Ok(StageStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Dimension, GridCell, PolicyArea};
    use crate::models::Chunk;

    #[test]
    fn extracts_cause_and_effect_spans() {
        let text = "La deserción aumentó debido a la falta de transporte escolar. \
                    Se adquirirán rutas, lo que genera mayor permanencia.";
        let spans = extract_spans(text, 0.0);

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].role, CausalRole::Cause);
        assert_eq!(spans[0].marker, "debido a");
        assert_eq!(spans[1].role, CausalRole::Effect);
        assert!(spans[1].text.contains("permanencia"));
    }

    #[test]
    fn spans_are_ordered_by_offset() {
        let text = "porque llueve. por lo tanto se inunda. porque no hay drenaje.";
        let spans = extract_spans(text, 0.0);
        let offsets: Vec<usize> = spans.iter().map(|s| s.offset).collect();
        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        assert_eq!(offsets, sorted);
    }

    #[test]
    fn no_markers_no_spans() {
        assert!(extract_spans("El municipio tiene 24.000 habitantes.", 0.0).is_empty());
    }

    #[test]
    fn lowercase_expanding_characters_keep_offsets_in_bounds() {
        // U+0130 lowercases to two scalars, so lowered offsets drift
        // past the original byte length for text that carries it.
        let text = "İİİİİİİİİİİİ porque sí";
        let spans = extract_spans(text, 0.0);

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].marker, "porque");
        assert!(spans[0].offset < text.len());
        assert!(text.is_char_boundary(spans[0].offset));
        assert!(spans[0].text.contains("porque"));
    }

    #[test]
    fn signal_weight_raises_span_weight() {
        let light = extract_spans("porque sí", 0.0);
        let heavy = extract_spans("porque sí", 0.8);
        assert!(heavy[0].weight > light[0].weight);
    }

    fn chunk_with_text(area: PolicyArea, dim: Dimension, text: &str) -> Chunk {
        let mut chunk = Chunk::placeholder(GridCell::new(area, dim));
        chunk.text = text.to_string();
        chunk
    }

    fn integrated_ctx(texts: Vec<(PolicyArea, Dimension, &str)>) -> PipelineContext {
        let mut ctx = PipelineContext::new("run-ci-0001", 5);
        ctx.chunks = texts
            .into_iter()
            .map(|(a, d, t)| chunk_with_text(a, d, t))
            .collect();
        let caps = CapabilitySet::probe(None);
        let _ = CausalExtractor.run(&mut ctx, &caps).unwrap();
        let _ = CausalIntegrator.run(&mut ctx, &caps).unwrap();
        ctx
    }

    #[test]
    fn links_effect_to_matching_cause_across_chunks() {
        let ctx = integrated_ctx(vec![
            (
                PolicyArea::Education,
                Dimension::Activities,
                "Se construirán aulas, lo que genera mejor cobertura escolar rural.",
            ),
            (
                PolicyArea::Education,
                Dimension::Outcomes,
                "La permanencia mejora debido a la cobertura escolar rural ampliada.",
            ),
        ]);

        assert_eq!(ctx.causal_chains.len(), 1);
        let chain = &ctx.causal_chains[0];
        assert_eq!(chain.segments.len(), 2);
        assert_eq!(chain.segments[0].chunk_id, "PA03-DIM02");
        assert_eq!(chain.segments[1].chunk_id, "PA03-DIM04");
        assert!(!chain.contradiction_evidence);
    }

    #[test]
    fn cycle_is_flagged_as_contradiction() {
        let ctx = integrated_ctx(vec![
            (
                PolicyArea::Health,
                Dimension::Activities,
                "Debido a la vacunación infantil ampliada, contribuye a reducir la mortalidad infantil evitable.",
            ),
            (
                PolicyArea::Health,
                Dimension::Outcomes,
                "Debido a reducir la mortalidad infantil evitable, por lo tanto crece la vacunación infantil ampliada.",
            ),
        ]);

        assert!(!ctx.causal_chains.is_empty());
        // The A→B→A walk revisits a chunk and must carry the flag.
        assert!(ctx.causal_chains.iter().any(|c| c.contradiction_evidence));
    }

    #[test]
    fn unrelated_chunks_produce_no_chains() {
        let ctx = integrated_ctx(vec![
            (
                PolicyArea::Culture,
                Dimension::Activities,
                "Festival municipal porque la tradición convoca.",
            ),
            (
                PolicyArea::Environment,
                Dimension::Outcomes,
                "Reforestación, lo que genera captura de carbono.",
            ),
        ]);
        assert!(ctx.causal_chains.is_empty());
    }

    #[test]
    fn chain_ids_are_stable() {
        let a = integrated_ctx(vec![
            (
                PolicyArea::Education,
                Dimension::Activities,
                "Aulas nuevas, lo que genera cobertura escolar rural.",
            ),
            (
                PolicyArea::Education,
                Dimension::Outcomes,
                "Mejora debido a la cobertura escolar rural.",
            ),
        ]);
        assert_eq!(a.causal_chains[0].chain_id, "CC-001");
    }
}
