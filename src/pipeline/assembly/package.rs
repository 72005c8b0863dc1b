//! Stage 18: package construction and postcondition verification.
//!
//! Assembles the canonical policy package from everything upstream,
//! stamps provenance hashes, then re-verifies the structural invariants
//! on the finished value. The verification is deliberately independent
//! of the integrity validator: a bug between stages 15 and 18 must not
//! ship a malformed package.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::capability::CapabilitySet;
use crate::config::SCHEMA_VERSION;
use crate::models::{
    CanonicalPolicyPackage, Language, PackageMetadata, ProvenanceHashes, SignalProvenance,
};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};

fn sha256_b64(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    BASE64.encode(hasher.finalize())
}

pub struct PackageConstructor;

impl Stage for PackageConstructor {
    fn name(&self) -> &'static str {
        "package_constructor"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        let raw = ctx
            .raw
            .as_ref()
            .ok_or_else(|| StageError::new("missing_input", "no extracted document"))?;

        let raw_text_sha256 = sha256_b64(raw.text.as_bytes());
        // Chunk-set hash over the canonical serialization, so any
        // change to any chunk changes the package fingerprint.
        let chunk_json = serde_json::to_vec(&ctx.smart_chunks)
            .map_err(|e| StageError::new("package_serialize", e.to_string()))?;
        let chunk_set_sha256 = sha256_b64(&chunk_json);

        let metadata = PackageMetadata {
            run_id: ctx.run_id.clone(),
            run_seed: ctx.run_seed,
            language: ctx.language.unwrap_or(Language::Spanish),
            signal_coverage_metrics: ctx.cross.coverage.clone().unwrap_or_default(),
            signal_provenance: SignalProvenance {
                pack_name: caps.provenance_name(),
                capability_available: !caps
                    .flags()
                    .iter()
                    .any(|f| f == "signal_pack=unavailable"),
            },
            truncation_audit: raw.audit.clone(),
            provenance: ProvenanceHashes {
                raw_text_sha256,
                chunk_set_sha256,
            },
            cross_chunk_links: ctx.cross.links.clone(),
            strategic_ranking: ctx.cross.ranking.clone(),
            degraded_stages: ctx.cross.degraded_stages.clone(),
            warnings: ctx.cross.warnings.clone(),
        };

        let package = CanonicalPolicyPackage {
            schema_version: SCHEMA_VERSION.to_string(),
            chunks: std::mem::take(&mut ctx.smart_chunks),
            metadata,
        };

        let violations = package.verify_invariants();
        if !violations.is_empty() {
            return Err(StageError::new(
                "package_integrity",
                violations.join("; "),
            ));
        }

        tracing::info!(
            chunks = package.chunks.len(),
            schema = %package.schema_version,
            "Canonical policy package constructed"
        );
        ctx.package = Some(package);
        Ok(StageStatus::Completed)
    }
}
