//! Stage 1: bounded extraction with an exact truncation audit.
//!
//! Streams source pages into text under a hard character ceiling. When
//! the ceiling is hit mid-stream the extractor stops retaining text but
//! keeps iterating every remaining page, so `total_length` and
//! `loss_ratio` measure the real document rather than estimating it;
//! downstream review decisions depend on the exact loss figure.
//!
//! Truncation is a normal, audited outcome. The only fatal error here
//! is an unreadable source.

use crate::capability::CapabilitySet;
use crate::models::{RawDocument, TruncationAudit};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::{Stage, StageError, StageStatus};
use crate::source::DocumentSource;

pub struct BoundedExtractor<'a> {
    source: &'a dyn DocumentSource,
    char_limit: usize,
}

impl<'a> BoundedExtractor<'a> {
    pub fn new(source: &'a dyn DocumentSource, char_limit: usize) -> Self {
        debug_assert!(char_limit > 0, "character limit must be positive");
        Self { source, char_limit }
    }

    /// Extract text from the source under the ceiling. Public seam so
    /// the extractor is usable (and testable) outside the staged run.
    pub fn extract(&self) -> Result<RawDocument, StageError> {
        let page_count = self
            .source
            .page_count()
            .map_err(|e| StageError::new("resource_unreadable", e.to_string()))?;

        let mut text = String::new();
        let mut retained = 0usize;
        let mut total = 0usize;
        let mut truncated = false;

        for index in 0..page_count {
            let mut page = self
                .source
                .read_page(index)
                .map_err(|e| StageError::new("resource_unreadable", e.to_string()))?;

            // The page separator is part of the extracted text, so it
            // counts against the ceiling and shows up in the audit.
            if index > 0 {
                page.insert(0, '\n');
            }
            let page_chars = page.chars().count();
            total += page_chars;

            if truncated {
                // Past the ceiling: keep counting, retain nothing.
                continue;
            }

            if retained + page_chars <= self.char_limit {
                text.push_str(&page);
                retained += page_chars;
            } else {
                let room = self.char_limit - retained;
                if room > 0 {
                    text.extend(page.chars().take(room));
                    retained += room;
                }
                truncated = true;
            }
        }

        let loss_ratio = if total == 0 {
            0.0
        } else {
            (total - retained) as f64 / total as f64
        };

        let audit = TruncationAudit {
            truncated,
            total_length: total,
            retained_length: retained,
            pages_processed: page_count,
            loss_ratio,
        };

        tracing::info!(
            source = self.source.source_id(),
            pages = page_count,
            retained,
            total,
            truncated,
            "Bounded extraction complete"
        );

        Ok(RawDocument {
            source_id: self.source.source_id().to_string(),
            text,
            audit,
        })
    }
}

impl Stage for BoundedExtractor<'_> {
    fn name(&self) -> &'static str {
        "bounded_extractor"
    }

    fn run(
        &self,
        ctx: &mut PipelineContext,
        _caps: &CapabilitySet,
    ) -> Result<StageStatus, StageError> {
        ctx.raw = Some(self.extract()?);
        Ok(StageStatus::Completed)
    }
}
