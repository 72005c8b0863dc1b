//! Shared pipeline context.
//!
//! One named field per stage output, plus a named cross-cutting block.
//! There is no keyed intermediate container, so every hand-off between
//! stages is visible in the type.

use sha2::{Digest, Sha256};

use crate::graph::KnowledgeGraph;
use crate::models::{
    CanonicalPolicyPackage, CausalChain, Chunk, CrossChunkLink, Language, RawDocument,
    SignalCoverageMetrics, SmartChunk,
};

/// A document section detected by the structural analyzer.
#[derive(Debug, Clone)]
pub struct Section {
    pub title: Option<String>,
    pub text: String,
    /// Offset of the section body in the normalized document.
    pub offset: usize,
}

/// Cross-cutting results that belong to no single chunk: links,
/// rankings, warnings, aggregate metrics.
#[derive(Debug, Default)]
pub struct CrossCutting {
    pub links: Vec<CrossChunkLink>,
    /// Chunk ids in strategic priority order.
    pub ranking: Vec<String>,
    pub warnings: Vec<String>,
    pub coverage: Option<SignalCoverageMetrics>,
    /// Stage names that fell back to degraded mode.
    pub degraded_stages: Vec<String>,
}

/// Mutable run state threaded through the stages in order. Exactly one
/// stage touches it at a time; each field is written by the stage that
/// owns it and read-only afterwards.
pub struct PipelineContext {
    pub run_id: String,
    pub run_seed: u64,

    /// Stage 1 (bounded extraction).
    pub raw: Option<RawDocument>,
    /// Stage 2 (language detection).
    pub language: Option<Language>,
    /// Stage 3 (preprocessing).
    pub normalized: Option<String>,
    /// Stage 4 (structural analysis).
    pub sections: Vec<Section>,
    /// Stage 5 (knowledge graph construction).
    pub graph: KnowledgeGraph,
    /// Stages 6-12 create and enrich these; always 60 after segmentation.
    pub chunks: Vec<Chunk>,
    /// Stage 8 (causal integration).
    pub causal_chains: Vec<CausalChain>,
    /// Stage 13 (chunk generation) onward.
    pub smart_chunks: Vec<SmartChunk>,
    /// Stage 18 (package construction); taken by the runner on success.
    pub package: Option<CanonicalPolicyPackage>,

    pub cross: CrossCutting,
}

impl PipelineContext {
    pub fn new(run_id: &str, run_seed: u64) -> Self {
        Self {
            run_id: run_id.to_string(),
            run_seed,
            raw: None,
            language: None,
            normalized: None,
            sections: Vec::new(),
            graph: KnowledgeGraph::new(),
            chunks: Vec::new(),
            causal_chains: Vec::new(),
            smart_chunks: Vec::new(),
            package: None,
            cross: CrossCutting::default(),
        }
    }

    /// Independent sub-seed for a stage's pseudo-random tie-breaking,
    /// derived from the run seed and the stage name. Re-running with the
    /// same seed always yields the same sub-seed sequence.
    pub fn stage_seed(&self, stage_name: &str) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.run_seed.to_le_bytes());
        hasher.update(stage_name.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Mark a stage as degraded (recorded once per stage).
    pub fn record_degraded(&mut self, stage_name: &str) {
        if !self.cross.degraded_stages.iter().any(|s| s == stage_name) {
            self.cross.degraded_stages.push(stage_name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_seeds_are_deterministic_and_independent() {
        let ctx = PipelineContext::new("run-ctx-0001", 42);
        let again = PipelineContext::new("run-ctx-0001", 42);

        assert_eq!(ctx.stage_seed("segmenter"), again.stage_seed("segmenter"));
        assert_ne!(ctx.stage_seed("segmenter"), ctx.stage_seed("deduplicator"));

        let other_seed = PipelineContext::new("run-ctx-0001", 43);
        assert_ne!(ctx.stage_seed("segmenter"), other_seed.stage_seed("segmenter"));
    }

    #[test]
    fn degraded_stages_recorded_once() {
        let mut ctx = PipelineContext::new("run-ctx-0002", 1);
        ctx.record_degraded("segmenter");
        ctx.record_degraded("segmenter");
        assert_eq!(ctx.cross.degraded_stages, vec!["segmenter".to_string()]);
    }
}
