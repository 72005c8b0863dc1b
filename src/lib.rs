pub mod capability;
pub mod config;
pub mod graph;
pub mod grid;
pub mod models;
pub mod pipeline;
pub mod source;

pub mod breaker;

pub use capability::{Capability, CapabilitySet, SignalEntry, SignalPack};
pub use grid::{Dimension, GridCell, PolicyArea};
pub use models::{CanonicalPolicyPackage, Chunk, SmartChunk, TruncationAudit};
pub use pipeline::runner::IngestionRunner;
pub use pipeline::PipelineError;
pub use source::{DocumentSource, InMemorySource, PlainTextSource};
