//! Stage 14: inter-chunk enrichment.
//!
//! Links chunks whose tag sets overlap enough to matter. Links are
//! id pairs ordered ascending, generated by a fixed pairwise sweep in
//! canonical chunk order, so the link list is stable across runs.

use std::collections::BTreeSet;

use crate::capability::CapabilitySet;
use crate::models::CrossChunkLink;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

/// Minimum Jaccard similarity of two tag sets for a link.
pub const LINK_SIMILARITY_THRESHOLD: f32 = 0.3;

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f32 / union as f32
}

pub struct InterChunkEnricher;

impl Stage for InterChunkEnricher {
    fn name(&self) -> &'static str {
        "inter_chunk_enricher"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let mut links = Vec::new();

        for i in 0..ctx.smart_chunks.len() {
            for j in (i + 1)..ctx.smart_chunks.len() {
                let a = &ctx.smart_chunks[i];
                let b = &ctx.smart_chunks[j];
                let similarity = jaccard(&a.tags, &b.tags);
                if similarity >= LINK_SIMILARITY_THRESHOLD {
                    links.push(CrossChunkLink {
                        chunk_a: a.chunk_id.clone(),
                        chunk_b: b.chunk_id.clone(),
                        similarity,
                    });
                }
            }
        }

        tracing::info!(links = links.len(), "Inter-chunk enrichment complete");
        ctx.cross.links = links;
        Ok(StageStatus::Completed)
    }
}
