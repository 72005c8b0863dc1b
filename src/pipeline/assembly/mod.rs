//! Stages 13-18: smart-chunk assembly, validation, and packaging.

pub mod chunkgen;
pub mod dedup;
pub mod enricher;
pub mod integrity;
pub mod package;
pub mod ranker;

pub use chunkgen::ChunkGenerator;
pub use dedup::Deduplicator;
pub use enricher::InterChunkEnricher;
pub use integrity::IntegrityValidator;
pub use package::PackageConstructor;
pub use ranker::StrategicRanker;
