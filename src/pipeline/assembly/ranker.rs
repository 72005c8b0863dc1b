//! Stage 17: strategic ranking.
//!
//! Ranks all 60 chunks by priority without reordering them: the chunk
//! list stays in canonical grid order and each chunk carries its rank.
//! Ties break by ascending chunk id.

use crate::capability::CapabilitySet;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

pub struct StrategicRanker;

impl Stage for StrategicRanker {
    fn name(&self) -> &'static str {
        "strategic_ranker"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let mut order: Vec<(String, f32)> = ctx
            .smart_chunks
            .iter()
            .map(|c| (c.chunk_id.clone(), c.priority_score))
            .collect();
        // Descending priority; f32 scores are always finite here, and
        // the id is the total tie-breaker.
        order.sort_by(|(id_a, pa), (id_b, pb)| {
            pb.partial_cmp(pa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| id_a.cmp(id_b))
        });

        let ranking: Vec<String> = order.into_iter().map(|(id, _)| id).collect();
        for chunk in &mut ctx.smart_chunks {
            let rank = ranking
                .iter()
                .position(|id| *id == chunk.chunk_id)
                .map(|p| p as u32);
            chunk.strategic_rank = rank;
        }

        tracing::info!(
            top = ranking.first().map(String::as_str).unwrap_or(""),
            "Strategic ranking complete"
        );
        ctx.cross.ranking = ranking;
        Ok(StageStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridCell;
    use crate::models::Chunk;
    use crate::pipeline::assembly::ChunkGenerator;
    use crate::pipeline::Stage;

    fn ranked_ctx(priorities: Vec<(usize, f32)>) -> PipelineContext {
        let mut ctx = PipelineContext::new("run-sr-0001", 6);
        ctx.chunks = GridCell::all().map(Chunk::placeholder).collect();
        let caps = CapabilitySet::probe(None);
        ChunkGenerator.run(&mut ctx, &caps).unwrap();
        for (idx, p) in priorities {
            ctx.smart_chunks[idx].priority_score = p;
        }
        StrategicRanker.run(&mut ctx, &caps).unwrap();
        ctx
    }

    #[test]
    fn highest_priority_ranks_first() {
        let ctx = ranked_ctx(vec![(10, 0.9), (3, 0.5)]);

        assert_eq!(ctx.cross.ranking[0], ctx.smart_chunks[10].chunk_id);
        assert_eq!(ctx.cross.ranking[1], ctx.smart_chunks[3].chunk_id);
        assert_eq!(ctx.smart_chunks[10].strategic_rank, Some(0));
        assert_eq!(ctx.smart_chunks[3].strategic_rank, Some(1));
    }

    #[test]
    fn ties_break_by_ascending_chunk_id() {
        let ctx = ranked_ctx(vec![]);
        // All zero priority: ranking is exactly canonical order.
        let canonical: Vec<String> = GridCell::all().map(|c| c.chunk_id()).collect();
        assert_eq!(ctx.cross.ranking, canonical);
    }

    #[test]
    fn chunk_list_order_is_not_disturbed() {
        let ctx = ranked_ctx(vec![(59, 1.0)]);
        let ids: Vec<String> = ctx.smart_chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let canonical: Vec<String> = GridCell::all().map(|c| c.chunk_id()).collect();
        assert_eq!(ids, canonical);
        assert_eq!(ctx.smart_chunks[59].strategic_rank, Some(0));
    }

    #[test]
    fn every_chunk_gets_a_rank() {
        let ctx = ranked_ctx(vec![(1, 0.2), (2, 0.4)]);
        let mut ranks: Vec<u32> = ctx
            .smart_chunks
            .iter()
            .map(|c| c.strategic_rank.unwrap())
            .collect();
        ranks.sort_unstable();
        let expected: Vec<u32> = (0..GridCell::COUNT as u32).collect();
        assert_eq!(ranks, expected);
    }
}
