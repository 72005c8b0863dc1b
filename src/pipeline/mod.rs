//! The multi-stage ingestion pipeline.
//!
//! Eighteen sequential transformation stages over a shared context,
//! each wrapped by the circuit breaker: extraction → language →
//! preprocessing → structure/graph/segmentation → causal/argument/
//! temporal/discourse/strategic analysis → chunk generation →
//! enrichment → validation → dedup → ranking → package construction.

pub mod analysis;
pub mod assembly;
pub mod context;
pub mod extraction;
pub mod runner;
pub mod structure;

use thiserror::Error;

use crate::capability::CapabilitySet;
use context::PipelineContext;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Top-level pipeline failure surfaced to callers. Either the run never
/// started (`InvalidRunId`) or a stage aborted through the circuit
/// breaker; there is no partially-valid outcome.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected pre-flight, before any stage runs. No manifest is written.
    #[error("Invalid run id '{0}' (expected [A-Za-z0-9][A-Za-z0-9_-]{{3,63}})")]
    InvalidRunId(String),

    /// A stage could not produce a structurally valid result. The circuit
    /// breaker aborted the run and wrote an error manifest.
    #[error("Stage '{stage}' failed fatally [{code}]: {message}")]
    StageFatal {
        stage: &'static str,
        code: &'static str,
        message: String,
    },

    /// Postcondition verification failed at package construction. The
    /// run is aborted; no package is returned.
    #[error("Package integrity violation: {0}")]
    PackageIntegrity(String),
}

/// Fatal error raised inside one stage. Always aborts the run; degraded
/// capability is a `StageStatus`, never one of these.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct StageError {
    pub code: &'static str,
    pub message: String,
}

impl StageError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// How a stage completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Completed,
    /// Completed with reduced confidence (capability fallback in effect).
    Degraded { reason: String },
}

/// One sequential transformation stage. Stages enrich the context in
/// place and must never change chunk identity (`chunk_id`, cell).
pub trait Stage {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        ctx: &mut PipelineContext,
        caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError>;
}
