pub mod bounded;
pub mod language;
pub mod preprocess;

pub use bounded::BoundedExtractor;
pub use language::LanguageDetector;
pub use preprocess::Preprocessor;
