//! Stage 16: near-duplicate sentence removal.
//!
//! Plan documents repeat themselves: the same commitment shows up in
//! the diagnostic, the strategy matrix, and the budget annex. When two
//! chunks carry near-identical sentences, the copy stays with the chunk
//! whose own tag vocabulary the sentence carries; a chunk holding the
//! sentence only in passing loses it even from a lower chunk id. Equal
//! ownership falls back to chunk priority, then to the lexicographically
//! lower chunk id, so the outcome never depends on iteration order.

use std::collections::BTreeSet;

use crate::capability::CapabilitySet;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

/// Word-set Jaccard similarity above which two sentences are the same
/// statement in different clothes.
pub const DUPLICATE_THRESHOLD: f32 = 0.9;

fn split_sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lowercased word set with punctuation stripped.
fn normalize(sentence: &str) -> BTreeSet<String> {
    sentence
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

/// How many of the chunk's own tags the sentence carries. Tags are
/// lowercased and may be multi-word, so this is a substring check
/// against the lowercased sentence.
fn tag_hits(tags: &BTreeSet<String>, sentence_lower: &str) -> usize {
    tags.iter()
        .filter(|t| sentence_lower.contains(t.as_str()))
        .count()
}

fn similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f32 / union as f32
}

pub struct Deduplicator;

impl Stage for Deduplicator {
    fn name(&self) -> &'static str {
        "deduplicator"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let sentences: Vec<Vec<String>> = ctx
            .smart_chunks
            .iter()
            .map(|c| split_sentences(&c.text))
            .collect();
        let normalized: Vec<Vec<BTreeSet<String>>> = sentences
            .iter()
            .map(|list| list.iter().map(|s| normalize(s)).collect())
            .collect();
        let lowered: Vec<Vec<String>> = sentences
            .iter()
            .map(|list| list.iter().map(|s| s.to_lowercase()).collect())
            .collect();

        // drop[i] holds sentence indices chunk i loses.
        let mut drop: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); ctx.smart_chunks.len()];
        let mut removed = 0;

        for i in 0..ctx.smart_chunks.len() {
            for j in (i + 1)..ctx.smart_chunks.len() {
                for (si, norm_a) in normalized[i].iter().enumerate() {
                    if drop[i].contains(&si) {
                        continue;
                    }
                    for (sj, norm_b) in normalized[j].iter().enumerate() {
                        if drop[j].contains(&sj) {
                            continue;
                        }
                        if similarity(norm_a, norm_b) < DUPLICATE_THRESHOLD {
                            continue;
                        }

                        let a = &ctx.smart_chunks[i];
                        let b = &ctx.smart_chunks[j];
                        // The sentence stays with the chunk whose own
                        // vocabulary it carries. Equal ownership falls
                        // back to priority; i precedes j in canonical
                        // order, so on a full tie the copy in i survives.
                        let owns_a = tag_hits(&a.tags, &lowered[i][si]);
                        let owns_b = tag_hits(&b.tags, &lowered[j][sj]);
                        let loser = if owns_a != owns_b {
                            if owns_a > owns_b { j } else { i }
                        } else if b.priority_score > a.priority_score {
                            i
                        } else {
                            j
                        };
                        let lost = if loser == i { si } else { sj };
                        if drop[loser].insert(lost) {
                            removed += 1;
                        }
                    }
                }
            }
        }

        for (idx, chunk) in ctx.smart_chunks.iter_mut().enumerate() {
            if drop[idx].is_empty() {
                continue;
            }
            chunk.text = sentences[idx]
                .iter()
                .enumerate()
                .filter(|(si, _)| !drop[idx].contains(si))
                .map(|(_, s)| s.as_str())
                .collect::<Vec<_>>()
                .join(" ");
        }

        tracing::info!(sentences_removed = removed, "Deduplication complete");
        Ok(StageStatus::Completed)
    }
}
