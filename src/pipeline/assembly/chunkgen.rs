//! Stage 13: smart-chunk generation.
//!
//! Seals the analysis phase: every working chunk becomes a finalized
//! smart chunk with tags, chain references, a composite priority score,
//! and a coverage figure. Anything short of exactly one smart chunk per
//! grid cell is fatal here rather than a surprise five stages later.

use std::collections::BTreeSet;

use crate::capability::CapabilitySet;
use crate::grid::GridCell;
use crate::models::{ArgumentScores, CausalChain, Chunk, DiscourseMode, SmartChunk};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

/// Causal spans per 100 words, capped at 1.0. Same density measure the
/// strategic integrator uses, recomputed here on the final text.
fn causal_density(span_count: usize, word_count: usize) -> f32 {
    if word_count == 0 {
        return 0.0;
    }
    ((span_count as f32 * 100.0) / word_count as f32).min(1.0)
}

/// Tags: matched signal keywords plus graph-entity labels that occur in
/// the chunk text. Lowercased, deduplicated, ordered.
fn build_tags(chunk: &Chunk, entity_labels: &[String]) -> BTreeSet<String> {
    let mut tags: BTreeSet<String> = chunk
        .matched_keywords
        .iter()
        .map(|k| k.to_lowercase())
        .collect();

    let lower = chunk.text.to_lowercase();
    for label in entity_labels {
        if lower.contains(label.as_str()) {
            tags.insert(label.clone());
        }
    }
    tags
}

fn chain_refs(chunk_id: &str, chains: &[CausalChain]) -> Vec<String> {
    chains
        .iter()
        .filter(|c| c.segments.iter().any(|s| s.chunk_id == chunk_id))
        .map(|c| c.chain_id.clone())
        .collect()
}

pub struct ChunkGenerator;

impl Stage for ChunkGenerator {
    fn name(&self) -> &'static str {
        "chunk_generator"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        if ctx.chunks.len() != GridCell::COUNT {
            return Err(StageError::new(
                "chunk_set_invalid",
                format!(
                    "expected {} working chunks, found {}",
                    GridCell::COUNT,
                    ctx.chunks.len()
                ),
            ));
        }

        let (pack, _) = caps.effective_signals();

        // Back-reference graph entities to the chunks whose source span
        // contains their first mention.
        for chunk in &ctx.chunks {
            let Some(start) = chunk.char_offset else {
                continue;
            };
            let end = start + chunk.text.len();
            for node in ctx.graph.nodes_mut() {
                if node.first_offset >= start && node.first_offset < end {
                    node.chunk_refs.push(chunk.chunk_id.clone());
                }
            }
        }

        let entity_labels: Vec<String> = ctx
            .graph
            .nodes()
            .iter()
            .map(|n| n.label.to_lowercase())
            .collect();

        let mut smart = Vec::with_capacity(GridCell::COUNT);
        for chunk in &ctx.chunks {
            let word_count = chunk.text.split_whitespace().count();
            let density = causal_density(chunk.causal_spans.len(), word_count);
            let argument = chunk.argument.clone().unwrap_or(ArgumentScores {
                necessity: 0.0,
                sufficiency: 0.0,
                strength: 0.0,
            });

            let priority_score = (argument.strength * 0.4
                + density * 0.3
                + chunk.priority_boost * 0.2
                + chunk.quality_boost * 0.1)
                .min(1.0);

            let coverage_completeness = {
                let entries = pack.entries(&chunk.cell);
                if entries.is_empty() {
                    0.0
                } else {
                    chunk.matched_keywords.len() as f32 / entries.len() as f32
                }
                .min(1.0)
            };

            smart.push(SmartChunk {
                chunk_id: chunk.chunk_id.clone(),
                cell: chunk.cell,
                text: chunk.text.clone(),
                tags: build_tags(chunk, &entity_labels),
                causal_chain_refs: chain_refs(&chunk.chunk_id, &ctx.causal_chains),
                causal_spans: chunk.causal_spans.clone(),
                argument,
                temporal_markers: chunk.temporal_markers.clone(),
                discourse: chunk.discourse.unwrap_or(DiscourseMode::Descriptive),
                priority_score,
                coverage_completeness,
                capability_degraded: chunk.capability_degraded,
                quality_tier: None,
                strategic_rank: None,
            });
        }

        tracing::info!(smart_chunks = smart.len(), "Smart chunk generation complete");
        ctx.smart_chunks = smart;
        Ok(StageStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CausalRole, CausalSpan, ChainSegment};

    fn populated_ctx() -> PipelineContext {
        let mut ctx = PipelineContext::new("run-cg-0001", 11);
        ctx.chunks = GridCell::all().map(Chunk::placeholder).collect();

        let first = &mut ctx.chunks[0];
        first.text = "Es necesario ampliar la protección social porque la pobreza creció.".into();
        first.matched_keywords = vec!["pobreza".into()];
        first.causal_spans = vec![CausalSpan {
            marker: "porque".into(),
            text: "porque la pobreza creció".into(),
            role: CausalRole::Cause,
            offset: 40,
            weight: 1.0,
        }];
        first.argument = Some(ArgumentScores {
            necessity: 0.8,
            sufficiency: 0.0,
            strength: 0.48,
        });

        ctx.causal_chains = vec![CausalChain {
            chain_id: "CC-001".into(),
            segments: vec![ChainSegment {
                chunk_id: "PA01-DIM01".into(),
                span_index: 0,
            }],
            contradiction_evidence: false,
        }];
        ctx
    }

    #[test]
    fn produces_one_smart_chunk_per_cell() {
        let mut ctx = populated_ctx();
        let caps = CapabilitySet::probe(None);
        let status = ChunkGenerator.run(&mut ctx, &caps).unwrap();

        assert!(matches!(status, StageStatus::Completed));
        assert_eq!(ctx.smart_chunks.len(), GridCell::COUNT);
    }

    #[test]
    fn wrong_chunk_count_is_fatal() {
        let mut ctx = PipelineContext::new("run-cg-0002", 0);
        ctx.chunks = vec![Chunk::placeholder(GridCell::all().next().unwrap())];
        let caps = CapabilitySet::probe(None);

        let err = ChunkGenerator.run(&mut ctx, &caps).unwrap_err();
        assert_eq!(err.code, "chunk_set_invalid");
    }

    #[test]
    fn chain_refs_attached_to_member_chunks() {
        let mut ctx = populated_ctx();
        let caps = CapabilitySet::probe(None);
        ChunkGenerator.run(&mut ctx, &caps).unwrap();

        assert_eq!(ctx.smart_chunks[0].causal_chain_refs, vec!["CC-001"]);
        assert!(ctx.smart_chunks[1].causal_chain_refs.is_empty());
    }

    #[test]
    fn priority_reflects_argument_and_causal_evidence() {
        let mut ctx = populated_ctx();
        let caps = CapabilitySet::probe(None);
        ChunkGenerator.run(&mut ctx, &caps).unwrap();

        assert!(ctx.smart_chunks[0].priority_score > 0.0);
        assert_eq!(ctx.smart_chunks[1].priority_score, 0.0);
    }

    #[test]
    fn tags_come_from_matched_keywords() {
        let mut ctx = populated_ctx();
        let caps = CapabilitySet::probe(None);
        ChunkGenerator.run(&mut ctx, &caps).unwrap();

        assert!(ctx.smart_chunks[0].tags.contains("pobreza"));
    }

    #[test]
    fn coverage_is_fraction_of_cell_vocabulary() {
        let mut ctx = populated_ctx();
        let caps = CapabilitySet::probe(None);
        ChunkGenerator.run(&mut ctx, &caps).unwrap();

        let c = &ctx.smart_chunks[0];
        assert!(c.coverage_completeness > 0.0 && c.coverage_completeness <= 1.0);
    }
}
