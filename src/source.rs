//! Document sources: paged read abstraction over policy-plan inputs.
//!
//! The bounded extractor only ever sees this trait, so tests can feed
//! in-memory pages and production code can read plan files without the
//! pipeline knowing the difference.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A source is unreadable. Surfaced by the bounded extractor as a fatal
/// resource error; truncation is never one of these.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error reading source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("Page {0} out of range")]
    PageOutOfRange(usize),
}

/// Paged, read-only access to one source document.
pub trait DocumentSource {
    /// Stable identifier for provenance (path, URI, test name).
    fn source_id(&self) -> &str;

    fn page_count(&self) -> Result<usize, SourceError>;

    fn read_page(&self, index: usize) -> Result<String, SourceError>;
}

// ---------------------------------------------------------------------------
// Plain-text file source
// ---------------------------------------------------------------------------

/// Plain-text plan file. Pages are separated by form feed (`\x0c`),
/// the convention used by text exports of paginated documents; a file
/// without form feeds is a single page.
#[derive(Debug)]
pub struct PlainTextSource {
    path: PathBuf,
    id: String,
    pages: Vec<String>,
}

impl PlainTextSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|e| SourceError::Encoding(e.to_string()))?;

        let pages: Vec<String> = text.split('\x0c').map(|p| p.to_string()).collect();

        Ok(Self {
            id: path.display().to_string(),
            path: path.to_path_buf(),
            pages,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSource for PlainTextSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn page_count(&self) -> Result<usize, SourceError> {
        Ok(self.pages.len())
    }

    fn read_page(&self, index: usize) -> Result<String, SourceError> {
        self.pages
            .get(index)
            .cloned()
            .ok_or(SourceError::PageOutOfRange(index))
    }
}

// ---------------------------------------------------------------------------
// In-memory source (tests, embedding callers)
// ---------------------------------------------------------------------------

pub struct InMemorySource {
    id: String,
    pages: Vec<String>,
}

impl InMemorySource {
    pub fn new(id: &str, pages: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            pages,
        }
    }

    pub fn single_page(id: &str, text: &str) -> Self {
        Self::new(id, vec![text.to_string()])
    }
}

impl DocumentSource for InMemorySource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn page_count(&self) -> Result<usize, SourceError> {
        Ok(self.pages.len())
    }

    fn read_page(&self, index: usize) -> Result<String, SourceError> {
        self.pages
            .get(index)
            .cloned()
            .ok_or(SourceError::PageOutOfRange(index))
    }
}
