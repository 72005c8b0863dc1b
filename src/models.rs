//! Data model for the ingestion pipeline and the final package.
//!
//! `Chunk` is created once per grid cell by the segmenter and enriched in
//! place by every analysis stage; `SmartChunk` is its finalized form.
//! `CanonicalPolicyPackage` is constructed once, at the very end, and is
//! never returned unless its invariants verify.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::grid::GridCell;

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Source document after bounded extraction. Immutable once handed to
/// the language detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub source_id: String,
    pub text: String,
    pub audit: TruncationAudit,
}

/// Exact record of how much input was dropped at the character ceiling.
///
/// `total_length` counts every page of the source, including pages past
/// the ceiling: the extractor keeps iterating after it stops retaining
/// text, so `loss_ratio` is a measurement, not an estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruncationAudit {
    pub truncated: bool,
    pub total_length: usize,
    pub retained_length: usize,
    pub pages_processed: usize,
    /// Fraction of characters dropped, always within [0, 1].
    pub loss_ratio: f64,
}

impl TruncationAudit {
    pub fn untruncated(length: usize, pages: usize) -> Self {
        Self {
            truncated: false,
            total_length: length,
            retained_length: length,
            pages_processed: pages,
            loss_ratio: 0.0,
        }
    }
}

/// Detected source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Spanish,
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Spanish => "es",
            Language::English => "en",
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis attributes accumulated on chunks
// ---------------------------------------------------------------------------

/// Whether a causal span names a cause or an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CausalRole {
    Cause,
    Effect,
}

/// A causal-marker span detected inside one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalSpan {
    pub marker: String,
    /// Sentence (or clause) the marker was found in, normalized.
    pub text: String,
    pub role: CausalRole,
    /// Byte offset of the marker within the chunk text.
    pub offset: usize,
    pub weight: f32,
}

/// Argumentative strength of a chunk's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentScores {
    /// How strongly the text claims the intervention is required.
    pub necessity: f32,
    /// How strongly the text claims the intervention is enough.
    pub sufficiency: f32,
    /// Combined strength in [0, 1].
    pub strength: f32,
}

/// Kind of temporal marker found in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalKind {
    Year,
    Horizon,
    Deadline,
    Frequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalMarker {
    pub kind: TemporalKind,
    pub text: String,
    /// Parsed year when the marker names one.
    pub year: Option<i32>,
}

/// Dominant discourse mode of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscourseMode {
    /// States where things stand: rates, baselines, gaps.
    Diagnostic,
    /// Commits to action: "se implementará", "deberá".
    Prescriptive,
    /// Reasons about why: causal and justificatory language.
    Argumentative,
    /// Paints the desired future without mechanism.
    Aspirational,
    /// None of the above dominates.
    Descriptive,
}

impl DiscourseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscourseMode::Diagnostic => "diagnostic",
            DiscourseMode::Prescriptive => "prescriptive",
            DiscourseMode::Argumentative => "argumentative",
            DiscourseMode::Aspirational => "aspirational",
            DiscourseMode::Descriptive => "descriptive",
        }
    }
}

// ---------------------------------------------------------------------------
// Chunk and SmartChunk
// ---------------------------------------------------------------------------

/// The unit of content for one grid cell. Created by the segmenter
/// (exactly 60 per run, empty spans allowed), enriched in place by the
/// analysis stages. Identity fields (`chunk_id`, `cell`) are never
/// changed after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub cell: GridCell,
    pub text: String,
    /// Offset of the selected span in the normalized document; None for
    /// empty placeholder chunks.
    pub char_offset: Option<usize>,
    /// Signal keywords matched during segmentation.
    pub matched_keywords: Vec<String>,
    /// Keyword affinity score from segmentation.
    pub affinity: f32,
    /// True when any stage enriched this chunk via fallback vocabulary.
    pub capability_degraded: bool,

    // Accumulated analysis outputs.
    pub causal_spans: Vec<CausalSpan>,
    pub argument: Option<ArgumentScores>,
    pub temporal_markers: Vec<TemporalMarker>,
    pub discourse: Option<DiscourseMode>,
    pub priority_boost: f32,
    pub quality_boost: f32,
}

impl Chunk {
    pub fn placeholder(cell: GridCell) -> Self {
        Self {
            chunk_id: cell.chunk_id(),
            cell,
            text: String::new(),
            char_offset: None,
            matched_keywords: Vec::new(),
            affinity: 0.0,
            capability_degraded: false,
            causal_spans: Vec::new(),
            argument: None,
            temporal_markers: Vec::new(),
            discourse: None,
            priority_boost: 0.0,
            quality_boost: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Signal-coverage quality tier, assigned by the integrity validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityTier {
    Excellent,
    Good,
    Adequate,
    Sparse,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "EXCELLENT",
            QualityTier::Good => "GOOD",
            QualityTier::Adequate => "ADEQUATE",
            QualityTier::Sparse => "SPARSE",
        }
    }
}

/// Fully enriched chunk, finalized by the chunk generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartChunk {
    pub chunk_id: String,
    pub cell: GridCell,
    pub text: String,
    pub tags: BTreeSet<String>,
    /// Ids of causal chains this chunk participates in.
    pub causal_chain_refs: Vec<String>,
    pub causal_spans: Vec<CausalSpan>,
    pub argument: ArgumentScores,
    pub temporal_markers: Vec<TemporalMarker>,
    pub discourse: DiscourseMode,
    /// Composite priority in [0, 1], input to the strategic ranker.
    pub priority_score: f32,
    /// Fraction of the cell's expected signal vocabulary found in the text.
    pub coverage_completeness: f32,
    pub capability_degraded: bool,
    /// Assigned by the integrity validator.
    pub quality_tier: Option<QualityTier>,
    /// Assigned by the strategic ranker (0 = highest priority).
    pub strategic_rank: Option<u32>,
}

// ---------------------------------------------------------------------------
// Cross-chunk structures
// ---------------------------------------------------------------------------

/// One step of a causal chain: a span inside a chunk, referenced by id
/// and index only (non-owning).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSegment {
    pub chunk_id: String,
    pub span_index: usize,
}

/// Ordered sequence of causal references across chunks.
/// A cycle is legal only as explicitly flagged contradiction evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalChain {
    pub chain_id: String,
    pub segments: Vec<ChainSegment>,
    pub contradiction_evidence: bool,
}

/// Similarity link between two chunks' tag sets. References by id pair,
/// ordered ascending; never owns chunk content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossChunkLink {
    pub chunk_a: String,
    pub chunk_b: String,
    pub similarity: f32,
}

// ---------------------------------------------------------------------------
// Package metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalCoverageMetrics {
    pub mean_coverage: f32,
    pub excellent: usize,
    pub good: usize,
    pub adequate: usize,
    pub sparse: usize,
    pub degraded_chunks: usize,
}

/// Where the signal vocabulary came from for this run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalProvenance {
    pub pack_name: String,
    pub capability_available: bool,
}

/// SHA-256 hashes binding the package to its input and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceHashes {
    pub raw_text_sha256: String,
    pub chunk_set_sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub run_id: String,
    pub run_seed: u64,
    pub language: Language,
    pub signal_coverage_metrics: SignalCoverageMetrics,
    pub signal_provenance: SignalProvenance,
    pub truncation_audit: TruncationAudit,
    pub provenance: ProvenanceHashes,
    pub cross_chunk_links: Vec<CrossChunkLink>,
    /// Chunk ids in strategic priority order (rank 0 first).
    pub strategic_ranking: Vec<String>,
    /// Stages that completed in degraded mode.
    pub degraded_stages: Vec<String>,
    /// Validation warnings (e.g. SPARSE tiers): quality notes, not errors.
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Canonical Policy Package
// ---------------------------------------------------------------------------

/// The final validated output: exactly 60 smart chunks, one per grid
/// cell, plus global metadata. Immutable after postcondition verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalPolicyPackage {
    pub schema_version: String,
    /// Sorted by ascending chunk id (canonical order).
    pub chunks: Vec<SmartChunk>,
    pub metadata: PackageMetadata,
}

impl CanonicalPolicyPackage {
    /// Re-check every structural invariant, independently of the
    /// integrity validator stage. Returns all violations found.
    pub fn verify_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.chunks.len() != GridCell::COUNT {
            violations.push(format!(
                "chunk count is {}, expected {}",
                self.chunks.len(),
                GridCell::COUNT
            ));
        }

        let pattern = regex::Regex::new(crate::config::CHUNK_ID_PATTERN)
            .unwrap_or_else(|e| unreachable!("chunk id pattern is a checked constant: {e}"));

        let mut seen = BTreeSet::new();
        for chunk in &self.chunks {
            if !pattern.is_match(&chunk.chunk_id) {
                violations.push(format!("malformed chunk id: {}", chunk.chunk_id));
            }
            if !seen.insert(chunk.chunk_id.clone()) {
                violations.push(format!("duplicate chunk id: {}", chunk.chunk_id));
            }
            if chunk.cell.chunk_id() != chunk.chunk_id {
                violations.push(format!(
                    "chunk id {} does not match its cell {}",
                    chunk.chunk_id,
                    chunk.cell.chunk_id()
                ));
            }
        }

        // Bijection onto the grid: every cell present exactly once.
        for cell in GridCell::all() {
            if !seen.contains(&cell.chunk_id()) {
                violations.push(format!("missing grid cell: {}", cell.chunk_id()));
            }
        }

        let ratio = self.metadata.truncation_audit.loss_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            violations.push(format!("loss_ratio {ratio} outside [0, 1]"));
        }

        if self.schema_version != crate::config::SCHEMA_VERSION {
            violations.push(format!(
                "schema_version '{}' != '{}'",
                self.schema_version,
                crate::config::SCHEMA_VERSION
            ));
        }

        violations
    }
}
