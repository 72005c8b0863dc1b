pub mod analyzer;
pub mod graph_builder;
pub mod segmenter;

pub use analyzer::StructuralAnalyzer;
pub use graph_builder::KnowledgeGraphBuilder;
pub use segmenter::Segmenter;
