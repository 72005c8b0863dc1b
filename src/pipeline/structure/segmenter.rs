//! Stage 6: segmentation onto the 10×6 grid.
//!
//! For each of the 60 (policy area, dimension) cells, selects the
//! best-matching section by keyword affinity. Ties break by earliest
//! position in document order; exact ties (duplicate sections) break by
//! the stage's seeded RNG so re-runs are reproducible. Cells without
//! textual evidence become empty placeholder chunks; the stage always
//! yields exactly 60 chunks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::capability::{CapabilitySet, SignalPack};
use crate::grid::GridCell;
use crate::models::Chunk;
use crate::pipeline::context::{PipelineContext, Section};
use crate::pipeline::{Stage, StageError, StageStatus};

/// One occurrence of a keyword counts its full weight; repeats add
/// diminishing value and are capped so a chanted term cannot dominate.
const MAX_OCCURRENCES_COUNTED: usize = 3;

struct CellMatch {
    section_index: usize,
    affinity: f32,
    matched_keywords: Vec<String>,
}

/// Score one section against one cell's vocabulary.
fn score_section(section_lower: &str, pack: &dyn SignalPack, cell: &GridCell) -> (f32, Vec<String>) {
    let mut affinity = 0.0f32;
    let mut matched = Vec::new();

    for entry in pack.entries(cell) {
        let keyword = entry.keyword.to_lowercase();
        let occurrences = section_lower.matches(&keyword).count();
        if occurrences > 0 {
            affinity += entry.weight * occurrences.min(MAX_OCCURRENCES_COUNTED) as f32;
            matched.push(entry.keyword.clone());
        }
    }

    matched.sort();
    matched.dedup();
    (affinity, matched)
}

/// Pick the best section for a cell. Ties: earliest offset, then RNG.
fn best_match(
    sections: &[Section],
    lowered: &[String],
    pack: &dyn SignalPack,
    cell: &GridCell,
    rng: &mut StdRng,
) -> Option<CellMatch> {
    let mut candidates: Vec<CellMatch> = Vec::new();
    let mut best_affinity = 0.0f32;

    for (index, lower) in lowered.iter().enumerate() {
        let (affinity, matched_keywords) = score_section(lower, pack, cell);
        if affinity <= 0.0 {
            continue;
        }
        if affinity > best_affinity {
            best_affinity = affinity;
            candidates.clear();
        }
        if (affinity - best_affinity).abs() < f32::EPSILON {
            candidates.push(CellMatch {
                section_index: index,
                affinity,
                matched_keywords,
            });
        }
    }

    if candidates.is_empty() {
        return None;
    }

    // Earliest document position wins among equal scores.
    let min_offset = candidates
        .iter()
        .map(|c| sections[c.section_index].offset)
        .min()?;
    candidates.retain(|c| sections[c.section_index].offset == min_offset);

    // Only byte-identical duplicate sections can still tie here.
    let pick = if candidates.len() == 1 {
        0
    } else {
        rng.gen_range(0..candidates.len())
    };
    Some(candidates.swap_remove(pick))
}

pub struct Segmenter;

impl Stage for Segmenter {
    fn name(&self) -> &'static str {
        "segmenter"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let (pack, degraded) = caps.effective_signals();
        let mut rng = StdRng::seed_from_u64(ctx.stage_seed(self.name()));

        let lowered: Vec<String> = ctx.sections.iter().map(|s| s.text.to_lowercase()).collect();

        let mut chunks = Vec::with_capacity(GridCell::COUNT);
        for cell in GridCell::all() {
            let chunk = match best_match(&ctx.sections, &lowered, pack, &cell, &mut rng) {
                Some(m) => {
                    let section = &ctx.sections[m.section_index];
                    Chunk {
                        chunk_id: cell.chunk_id(),
                        cell,
                        text: section.text.clone(),
                        char_offset: Some(section.offset),
                        matched_keywords: m.matched_keywords,
                        affinity: m.affinity,
                        capability_degraded: degraded,
                        causal_spans: Vec::new(),
                        argument: None,
                        temporal_markers: Vec::new(),
                        discourse: None,
                        priority_boost: 0.0,
                        quality_boost: 0.0,
                    }
                }
                None => {
                    let mut placeholder = Chunk::placeholder(cell);
                    placeholder.capability_degraded = degraded;
                    placeholder
                }
            };
            chunks.push(chunk);
        }

        // Anything other than one chunk per cell is fatal here.
        if chunks.len() != GridCell::COUNT {
            return Err(StageError::new(
                "segmentation_invalid",
                format!("produced {} chunks, expected {}", chunks.len(), GridCell::COUNT),
            ));
        }

        let populated = chunks.iter().filter(|c| !c.is_empty()).count();
        tracing::info!(populated, empty = GridCell::COUNT - populated, "Segmentation complete");

        ctx.chunks = chunks;

        if degraded {
            ctx.record_degraded(self.name());
            Ok(StageStatus::Degraded {
                reason: "signal pack unavailable, builtin vocabulary used for affinity".into(),
            })
        } else {
            Ok(StageStatus::Completed)
        }
    }
}
