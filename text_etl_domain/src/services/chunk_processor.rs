// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Processor Port
//!
//! The contract every pure chunk transform implements. Input polymorphism
//! is made explicit through [`ProcessorInput`]: a processor receives either
//! a whole [`Document`] (the executor's page-walking driver handles the
//! normalization to per-page text) or a slice of chunks.
//!
//! Processors must carry `document_id`, `section_id`, `section_title`,
//! `section_level`, `page_num`, `pipeline_run_id`, and `source_type`
//! forward unchanged; they must never reset them to defaults when the
//! parent had them.

use serde_json::Value;

use crate::entities::chunk::Chunk;
use crate::entities::document::Document;
use crate::error::EtlError;

/// Explicit input union for processors.
#[derive(Debug, Clone, Copy)]
pub enum ProcessorInput<'a> {
    Document(&'a Document),
    Chunks(&'a [Chunk]),
}

impl<'a> ProcessorInput<'a> {
    pub fn len(&self) -> usize {
        match self {
            ProcessorInput::Document(doc) => doc.pages().len(),
            ProcessorInput::Chunks(chunks) => chunks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A pure transform from input to a list of chunks.
pub trait ChunkProcessor: Send + Sync {
    /// Applies the transform. `params` is the kind-specific parameter
    /// object from the step configuration.
    fn process(&self, input: ProcessorInput<'_>, params: &Value) -> Result<Vec<Chunk>, EtlError>;

    /// Metadata keys this processor expects on its input chunks.
    fn required_context(&self) -> &'static [&'static str] {
        &["document_id", "page_num", "section_id"]
    }
}
