// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Paragraph Splitter
//!
//! Splits text on two-or-more consecutive newlines (`\n\s*\n`), trims each
//! part, and skips empties. Result chunks carry `chunk_type = PARAGRAPH`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use text_etl_domain::entities::chunk::{Chunk, ChunkType};
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_processor::{ChunkProcessor, ProcessorInput};

use super::page_metadata;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph break pattern is valid"));

pub struct ParagraphSplitter;

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

impl ChunkProcessor for ParagraphSplitter {
    fn process(&self, input: ProcessorInput<'_>, _params: &Value) -> Result<Vec<Chunk>, EtlError> {
        match input {
            ProcessorInput::Document(document) => {
                let mut all = Vec::new();
                for page in document.pages() {
                    for paragraph in split_paragraphs(&page.raw_text) {
                        let meta = page_metadata(document, page.number, ChunkType::Paragraph)?;
                        all.push(Chunk::new(paragraph, meta));
                    }
                }
                Ok(all)
            }
            ProcessorInput::Chunks(chunks) => {
                let mut all = Vec::new();
                for chunk in chunks {
                    for paragraph in split_paragraphs(chunk.text()) {
                        all.push(Chunk::new(paragraph, chunk.meta().derived(ChunkType::Paragraph)));
                    }
                }
                Ok(all)
            }
        }
    }
}
