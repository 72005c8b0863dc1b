pub mod argument;
pub mod causal;
pub mod discourse;
pub mod strategic;
pub mod temporal;

pub use argument::ArgumentAnalyzer;
pub use causal::{CausalExtractor, CausalIntegrator};
pub use discourse::DiscourseAnalyzer;
pub use strategic::StrategicIntegrator;
pub use temporal::TemporalAnalyzer;
