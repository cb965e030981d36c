// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Line Splitter
//!
//! Splits text on `\n`, trims whitespace, and skips empty lines. Line
//! numbers count every source line (including skipped empties) and start
//! from the parent chunk's `line_num` when present, else 1. Result chunks
//! carry `chunk_type = LINE`.

use serde_json::Value;

use text_etl_domain::entities::chunk::{Chunk, ChunkType};
use text_etl_domain::entities::document::Document;
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_processor::{ChunkProcessor, ProcessorInput};

use super::page_metadata;

pub struct LineSplitter;

impl LineSplitter {
    fn split_page(&self, document: &Document, page_num: u32, text: &str) -> Result<Vec<Chunk>, EtlError> {
        let mut chunks = Vec::new();
        for (index, line) in text.split('\n').enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let meta = page_metadata(document, page_num, ChunkType::Line)?
                .with_line_num(index as u32 + 1)?;
            chunks.push(Chunk::new(trimmed, meta));
        }
        Ok(chunks)
    }

    fn split_chunk(&self, chunk: &Chunk) -> Result<Vec<Chunk>, EtlError> {
        let start = chunk.meta().line_num().unwrap_or(1);
        let mut chunks = Vec::new();
        for (index, line) in chunk.text().split('\n').enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let meta = chunk
                .meta()
                .derived(ChunkType::Line)
                .with_line_num(start + index as u32)?;
            chunks.push(Chunk::new(trimmed, meta));
        }
        Ok(chunks)
    }
}

impl ChunkProcessor for LineSplitter {
    fn process(&self, input: ProcessorInput<'_>, _params: &Value) -> Result<Vec<Chunk>, EtlError> {
        match input {
            ProcessorInput::Document(document) => {
                let mut all = Vec::new();
                for page in document.pages() {
                    all.extend(self.split_page(document, page.number, &page.raw_text)?);
                }
                Ok(all)
            }
            ProcessorInput::Chunks(chunks) => {
                let mut all = Vec::new();
                for chunk in chunks {
                    all.extend(self.split_chunk(chunk)?);
                }
                Ok(all)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use text_etl_domain::entities::chunk::Metadata;
    use text_etl_domain::entities::document::{DocumentFormat, Page};

    fn chunk_with(text: &str) -> Chunk {
        let meta = Metadata::new("doc-1", "sec-1", "Intro", 2)
            .unwrap()
            .with_page_num(3)
            .unwrap()
            .with_pipeline_run_id("run-9")
            .with_source_type("pdf");
        Chunk::new(text, meta)
    }

    #[test]
    fn test_empty_input_yields_empty_list() {
        let splitter = LineSplitter;
        let out = splitter
            .process(ProcessorInput::Chunks(&[chunk_with("")]), &json!({}))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_splits_and_trims_lines() {
        let splitter = LineSplitter;
        let input = [chunk_with("  alpha  \n\nbeta\n")];
        let out = splitter.process(ProcessorInput::Chunks(&input), &json!({})).unwrap();
        let texts: Vec<&str> = out.iter().map(Chunk::text).collect();
        assert_eq!(texts, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_line_numbers_count_skipped_empties() {
        let splitter = LineSplitter;
        let input = [chunk_with("a\n\nb")];
        let out = splitter.process(ProcessorInput::Chunks(&input), &json!({})).unwrap();
        assert_eq!(out[0].meta().line_num(), Some(1));
        assert_eq!(out[1].meta().line_num(), Some(3));
    }

    #[test]
    fn test_line_numbers_start_from_parent() {
        let splitter = LineSplitter;
        let mut parent = chunk_with("x\ny");
        let refined = parent.meta().clone().with_line_num(10).unwrap();
        *parent.meta_mut() = refined;
        let input = [parent];
        let out = splitter.process(ProcessorInput::Chunks(&input), &json!({})).unwrap();
        assert_eq!(out[0].meta().line_num(), Some(10));
        assert_eq!(out[1].meta().line_num(), Some(11));
    }

    #[test]
    fn test_provenance_is_propagated() {
        let splitter = LineSplitter;
        let input = [chunk_with("one\ntwo")];
        let out = splitter.process(ProcessorInput::Chunks(&input), &json!({})).unwrap();
        for chunk in &out {
            assert_eq!(chunk.meta().document_id(), "doc-1");
            assert_eq!(chunk.meta().section_id(), "sec-1");
            assert_eq!(chunk.meta().section_level(), 2);
            assert_eq!(chunk.meta().page_num(), Some(3));
            assert_eq!(chunk.meta().pipeline_run_id(), Some("run-9"));
            assert_eq!(chunk.meta().source_type(), "pdf");
            assert_eq!(chunk.meta().chunk_type(), ChunkType::Line);
        }
    }

    #[test]
    fn test_document_input_walks_pages() {
        let splitter = LineSplitter;
        let mut doc = Document::new("a.txt", DocumentFormat::Txt);
        doc.add_page(Page::new(1, "A\nB\n").unwrap()).unwrap();
        doc.add_page(Page::new(2, "C").unwrap()).unwrap();
        let out = splitter.process(ProcessorInput::Document(&doc), &json!({})).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].meta().page_num(), Some(1));
        assert_eq!(out[2].meta().page_num(), Some(2));
        assert_eq!(out[0].meta().document_id(), doc.id);
    }
}
