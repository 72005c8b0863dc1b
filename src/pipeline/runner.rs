//! Pipeline entry point.
//!
//! Drives all eighteen stages over one document under circuit-breaker
//! containment and returns the verified canonical policy package. The
//! run id is validated before anything executes; a malformed id never
//! produces a manifest because no run ever started.

use std::path::PathBuf;

use regex::Regex;

use crate::breaker::CircuitBreaker;
use crate::capability::{CapabilitySet, SignalPack};
use crate::config::{DEFAULT_CHAR_LIMIT, RUN_ID_PATTERN};
use crate::models::CanonicalPolicyPackage;
use crate::pipeline::analysis::{
    ArgumentAnalyzer, CausalExtractor, CausalIntegrator, DiscourseAnalyzer, StrategicIntegrator,
    TemporalAnalyzer,
};
use crate::pipeline::assembly::{
    ChunkGenerator, Deduplicator, InterChunkEnricher, IntegrityValidator, PackageConstructor,
    StrategicRanker,
};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::extraction::{BoundedExtractor, LanguageDetector, Preprocessor};
use crate::pipeline::structure::{KnowledgeGraphBuilder, Segmenter, StructuralAnalyzer};
use crate::pipeline::{PipelineError, Stage};
use crate::source::DocumentSource;

pub struct IngestionRunner {
    caps: CapabilitySet,
    char_limit: usize,
    manifest_dir: Option<PathBuf>,
}

impl IngestionRunner {
    /// Runner with the default character ceiling and no injected signal
    /// pack (built-in vocabulary, degraded provenance).
    pub fn new() -> Self {
        Self::with_signal_pack(None)
    }

    pub fn with_signal_pack(pack: Option<Box<dyn SignalPack + Send + Sync>>) -> Self {
        Self {
            caps: CapabilitySet::probe(pack),
            char_limit: DEFAULT_CHAR_LIMIT,
            manifest_dir: None,
        }
    }

    pub fn char_limit(mut self, limit: usize) -> Self {
        self.char_limit = limit;
        self
    }

    /// Redirect error manifests away from the well-known directory.
    pub fn manifest_dir(mut self, dir: PathBuf) -> Self {
        self.manifest_dir = Some(dir);
        self
    }

    /// Ingest one document end to end.
    ///
    /// Same source, same run id, same seed: byte-identical package.
    pub fn run(
        &self,
        source: &dyn DocumentSource,
        run_id: &str,
        run_seed: u64,
    ) -> Result<CanonicalPolicyPackage, PipelineError> {
        let id_pattern = Regex::new(RUN_ID_PATTERN)
            .unwrap_or_else(|e| unreachable!("run id pattern is a checked constant: {e}"));
        if !id_pattern.is_match(run_id) {
            return Err(PipelineError::InvalidRunId(run_id.to_string()));
        }

        tracing::info!(run_id = %run_id, run_seed, source = source.source_id(), "Ingestion run starting");

        let mut breaker = match &self.manifest_dir {
            Some(dir) => CircuitBreaker::with_manifest_dir(run_id, dir.clone()),
            None => CircuitBreaker::new(run_id),
        };
        let mut ctx = PipelineContext::new(run_id, run_seed);

        let extractor = BoundedExtractor::new(source, self.char_limit);
        let stages: [&dyn Stage; 18] = [
            &extractor,
            &LanguageDetector,
            &Preprocessor,
            &StructuralAnalyzer,
            &KnowledgeGraphBuilder,
            &Segmenter,
            &CausalExtractor,
            &CausalIntegrator,
            &ArgumentAnalyzer,
            &TemporalAnalyzer,
            &DiscourseAnalyzer,
            &StrategicIntegrator,
            &ChunkGenerator,
            &InterChunkEnricher,
            &IntegrityValidator,
            &Deduplicator,
            &StrategicRanker,
            &PackageConstructor,
        ];

        for stage in stages {
            breaker
                .execute(stage, &mut ctx, &self.caps)
                .map_err(|err| match err {
                    PipelineError::StageFatal {
                        code: "package_integrity",
                        message,
                        ..
                    } => PipelineError::PackageIntegrity(message),
                    other => other,
                })?;
        }
        breaker.complete();

        let package = ctx.package.take().ok_or_else(|| {
            PipelineError::PackageIntegrity("package constructor produced no package".to_string())
        })?;

        tracing::info!(
            run_id = %run_id,
            chunks = package.chunks.len(),
            degraded_stages = package.metadata.degraded_stages.len(),
            "Ingestion run completed"
        );
        Ok(package)
    }
}

impl Default for IngestionRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;

    fn plan_text() -> String {
        "DIAGNÓSTICO\n\
         La tasa de pobreza es del 34% según la línea base municipal.\n\
         En salud, la cobertura de vacunación llegó al 85% en 2023.\n\
         EDUCACIÓN\n\
         Es necesario reducir la deserción escolar porque afecta la permanencia.\n\
         Se construirá un colegio y se implementará transporte escolar en 2026.\n\
         Esto contribuye a mejorar la cobertura educativa en la zona rural.\n"
            .to_string()
    }

    #[test]
    fn full_run_produces_valid_package() {
        let source = InMemorySource::single_page("plan.txt", &plan_text());
        let dir = tempfile::tempdir().unwrap();
        let runner = IngestionRunner::new().manifest_dir(dir.path().to_path_buf());

        let package = runner.run(&source, "run-full-0001", 7).unwrap();
        assert!(package.verify_invariants().is_empty());
        assert_eq!(package.metadata.run_id, "run-full-0001");
        // No pack injected: degraded stages recorded.
        assert!(!package.metadata.degraded_stages.is_empty());
    }

    #[test]
    fn malformed_run_id_rejected_before_any_stage() {
        let source = InMemorySource::single_page("plan.txt", &plan_text());
        let dir = tempfile::tempdir().unwrap();
        let runner = IngestionRunner::new().manifest_dir(dir.path().to_path_buf());

        let err = runner.run(&source, "no spaces allowed", 7).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRunId(_)));
        // No run started, no manifest written.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn run_id_shorter_than_four_chars_rejected() {
        let source = InMemorySource::single_page("plan.txt", "texto");
        let err = IngestionRunner::new().run(&source, "abc", 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRunId(_)));
    }
}
