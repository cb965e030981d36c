// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metadata Propagator
//!
//! Two responsibilities:
//!
//! - **Section detection**: applied to a document (via
//!   [`MetadataPropagator::detect_and_attach`], which needs mutable
//!   access), it builds a [`HeaderDetector`] from the step's
//!   `header_style_definitions` parameter and attaches detected sections.
//!   The executor calls this directly for document-shaped input; the
//!   `ChunkProcessor` document branch therefore yields no chunks.
//! - **Propagation**: [`MetadataPropagator::propagate_from_parent`]
//!   enforces the metadata propagation rule from a parent chunk onto its
//!   children.

use serde::Deserialize;
use serde_json::Value;

use text_etl_domain::entities::chunk::Chunk;
use text_etl_domain::entities::document::Document;
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_processor::{ChunkProcessor, ProcessorInput};
use text_etl_domain::services::header_detector::HeaderDetector;
use text_etl_domain::value_objects::header_rules::HeaderStyleDefinition;

#[derive(Debug, Default, Deserialize)]
struct PropagatorParams {
    #[serde(default)]
    header_style_definitions: Vec<HeaderStyleDefinition>,
}

/// Propagates provenance metadata and runs style-based section detection.
#[derive(Default)]
pub struct MetadataPropagator {
    default_styles: Vec<HeaderStyleDefinition>,
}

impl MetadataPropagator {
    /// Propagator with a default style set used when a step supplies no
    /// `header_style_definitions` parameter.
    pub fn with_styles(default_styles: Vec<HeaderStyleDefinition>) -> Self {
        Self { default_styles }
    }

    fn detector_for(&self, params: &Value) -> HeaderDetector {
        let parsed: PropagatorParams = serde_json::from_value(params.clone()).unwrap_or_default();
        if parsed.header_style_definitions.is_empty() {
            HeaderDetector::new(self.default_styles.clone())
        } else {
            HeaderDetector::new(parsed.header_style_definitions)
        }
    }

    /// Detects sections in the document from the configured styles and
    /// attaches them. Returns the number of sections added.
    pub fn detect_and_attach(
        &self,
        document: &mut Document,
        params: &Value,
    ) -> Result<usize, EtlError> {
        self.detector_for(params).detect_sections(document)
    }

    /// Enforces the propagation rule from `parent` onto `children`.
    pub fn propagate_from_parent(&self, parent: &Chunk, mut children: Vec<Chunk>) -> Vec<Chunk> {
        for child in &mut children {
            child.meta_mut().inherit_from(parent.meta());
        }
        children
    }
}

impl ChunkProcessor for MetadataPropagator {
    fn process(&self, input: ProcessorInput<'_>, _params: &Value) -> Result<Vec<Chunk>, EtlError> {
        match input {
            // Section attachment mutates the document; the executor calls
            // detect_and_attach for document-shaped input.
            ProcessorInput::Document(_) => Ok(Vec::new()),
            ProcessorInput::Chunks(chunks) => Ok(chunks.to_vec()),
        }
    }

    fn required_context(&self) -> &'static [&'static str] {
        &[
            "document_id",
            "page_num",
            "section_id",
            "section_title",
            "section_level",
        ]
    }
}
