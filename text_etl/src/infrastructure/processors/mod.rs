// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Processors
//!
//! Pure transforms implementing the [`ChunkProcessor`] port: line,
//! paragraph, sentence, and delimiter splitters, the regex extractor, and
//! the metadata propagator. The [`ProcessorRegistry`] maps step kinds to
//! processor instances for the document executor's dispatch.
//!
//! All processors carry `document_id`, `section_id`, `section_title`,
//! `section_level`, `page_num`, `pipeline_run_id`, and `source_type`
//! forward unchanged from their input chunks.

pub mod delimiter_splitter;
pub mod line_splitter;
pub mod metadata_propagator;
pub mod paragraph_splitter;
pub mod regex_extractor;
pub mod sentence_splitter;

use std::collections::HashMap;
use std::sync::Arc;

use text_etl_domain::entities::chunk::{ChunkType, Metadata};
use text_etl_domain::entities::document::Document;
use text_etl_domain::entities::pipeline::StepKind;
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_processor::ChunkProcessor;

pub use delimiter_splitter::DelimiterSplitter;
pub use line_splitter::LineSplitter;
pub use metadata_propagator::MetadataPropagator;
pub use paragraph_splitter::ParagraphSplitter;
pub use regex_extractor::RegexExtractor;
pub use sentence_splitter::SentenceSplitter;

/// Base metadata for chunks cut directly from a document page. Section
/// fields start as "unknown" until the metadata propagator attaches
/// detected sections.
pub(crate) fn page_metadata(
    document: &Document,
    page_num: u32,
    chunk_type: ChunkType,
) -> Result<Metadata, EtlError> {
    Ok(Metadata::unsectioned(document.id.clone())?
        .with_page_num(page_num)?
        .with_chunk_type(chunk_type)
        .with_source_type(document.format.to_string()))
}

/// Maps step kinds to the processors bound to them.
pub struct ProcessorRegistry {
    processors: HashMap<StepKind, Arc<dyn ChunkProcessor>>,
}

impl ProcessorRegistry {
    /// Registry with the standard processor set.
    pub fn standard() -> Self {
        let mut processors: HashMap<StepKind, Arc<dyn ChunkProcessor>> = HashMap::new();
        processors.insert(StepKind::LineSplitter, Arc::new(LineSplitter));
        processors.insert(StepKind::ParagraphSplitter, Arc::new(ParagraphSplitter));
        processors.insert(StepKind::SentenceSplitter, Arc::new(SentenceSplitter));
        processors.insert(StepKind::DelimiterSplitter, Arc::new(DelimiterSplitter));
        processors.insert(StepKind::RegexExtractor, Arc::new(RegexExtractor));
        processors.insert(StepKind::MetadataPropagator, Arc::new(MetadataPropagator::default()));
        Self { processors }
    }

    pub fn get(&self, kind: StepKind) -> Option<Arc<dyn ChunkProcessor>> {
        self.processors.get(&kind).cloned()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_processor_kinds() {
        let registry = ProcessorRegistry::standard();
        for kind in [
            StepKind::LineSplitter,
            StepKind::ParagraphSplitter,
            StepKind::SentenceSplitter,
            StepKind::DelimiterSplitter,
            StepKind::RegexExtractor,
            StepKind::MetadataPropagator,
        ] {
            assert!(registry.get(kind).is_some(), "missing processor for {}", kind);
        }
        assert!(registry.get(StepKind::DocumentLoader).is_none());
    }
}
