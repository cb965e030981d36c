// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Entity
//!
//! A `Chunk` is the smallest addressable text fragment in the engine. Every
//! chunk carries full provenance through its immutable [`Metadata`]: which
//! document it came from, which page and section, which pipeline run
//! produced it, and how it was derived (line, paragraph, sentence, custom
//! split, or whole document).
//!
//! ## Hierarchy
//!
//! Splitting a chunk produces child chunks. The tree invariants are:
//!
//! - every child's `parent_id` equals the parent's `id`;
//! - the tree has no cycles (children are owned, so the type system
//!   guarantees this);
//! - text may be empty only for container chunks (chunks with children).
//!
//! ## Metadata Propagation
//!
//! When a parent is split, each child inherits `document_id`, `section_id`,
//! `section_title`, `section_level`, `page_num`, `pipeline_run_id`, and
//! `source_type` unchanged; `line_num` and `chunk_type` may be refined by
//! the splitter. [`Metadata::derived`] implements this rule.
//!
//! ## Serialization
//!
//! Chunks round-trip through [`ChunkRecord`], which stores a display text
//! truncated to 50 characters alongside the complete original text, so
//! human-facing listings stay short while deserialization is lossless.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::EtlError;

/// How a chunk was derived from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Line,
    Paragraph,
    Sentence,
    Custom,
    Document,
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkType::Line => "line",
            ChunkType::Paragraph => "paragraph",
            ChunkType::Sentence => "sentence",
            ChunkType::Custom => "custom",
            ChunkType::Document => "document",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ChunkType {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" => Ok(ChunkType::Line),
            "paragraph" => Ok(ChunkType::Paragraph),
            "sentence" => Ok(ChunkType::Sentence),
            "custom" => Ok(ChunkType::Custom),
            "document" => Ok(ChunkType::Document),
            other => Err(EtlError::ValidationError(format!(
                "invalid chunk type: {}",
                other
            ))),
        }
    }
}

/// Immutable provenance context bound to a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    document_id: String,
    section_id: String,
    section_title: String,
    section_level: u32,
    #[serde(default)]
    page_num: Option<u32>,
    #[serde(default)]
    line_num: Option<u32>,
    chunk_type: ChunkType,
    #[serde(default)]
    pipeline_run_id: Option<String>,
    #[serde(default = "Metadata::unknown_source")]
    source_type: String,
}

impl Metadata {
    fn unknown_source() -> String {
        "unknown".to_string()
    }

    /// Creates metadata with the required provenance fields.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::ValidationError` when `document_id` or
    /// `section_id` is empty, or `section_level` is zero.
    pub fn new(
        document_id: impl Into<String>,
        section_id: impl Into<String>,
        section_title: impl Into<String>,
        section_level: u32,
    ) -> Result<Self, EtlError> {
        let document_id = document_id.into();
        let section_id = section_id.into();
        if document_id.is_empty() {
            return Err(EtlError::ValidationError(
                "document_id cannot be empty".to_string(),
            ));
        }
        if section_id.is_empty() {
            return Err(EtlError::ValidationError(
                "section_id cannot be empty".to_string(),
            ));
        }
        if section_level < 1 {
            return Err(EtlError::ValidationError(
                "section_level cannot be less than 1".to_string(),
            ));
        }
        Ok(Self {
            document_id,
            section_id,
            section_title: section_title.into(),
            section_level,
            page_num: None,
            line_num: None,
            chunk_type: ChunkType::Custom,
            pipeline_run_id: None,
            source_type: Self::unknown_source(),
        })
    }

    /// Metadata for a chunk not yet attached to a detected section.
    pub fn unsectioned(document_id: impl Into<String>) -> Result<Self, EtlError> {
        Self::new(document_id, "unknown", "unknown", 1)
    }

    pub fn with_page_num(mut self, page_num: u32) -> Result<Self, EtlError> {
        if page_num < 1 {
            return Err(EtlError::ValidationError(
                "page_num cannot be less than 1".to_string(),
            ));
        }
        self.page_num = Some(page_num);
        Ok(self)
    }

    pub fn with_line_num(mut self, line_num: u32) -> Result<Self, EtlError> {
        if line_num < 1 {
            return Err(EtlError::ValidationError(
                "line_num cannot be less than 1".to_string(),
            ));
        }
        self.line_num = Some(line_num);
        Ok(self)
    }

    pub fn with_chunk_type(mut self, chunk_type: ChunkType) -> Self {
        self.chunk_type = chunk_type;
        self
    }

    pub fn with_pipeline_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.pipeline_run_id = Some(run_id.into());
        self
    }

    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = source_type.into();
        self
    }

    /// Child metadata per the propagation rule: provenance fields carry
    /// over unchanged, `chunk_type` is refined, and `line_num` starts from
    /// the parent's value until the splitter overrides it.
    pub fn derived(&self, chunk_type: ChunkType) -> Self {
        let mut child = self.clone();
        child.chunk_type = chunk_type;
        child
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn section_id(&self) -> &str {
        &self.section_id
    }

    pub fn section_title(&self) -> &str {
        &self.section_title
    }

    pub fn section_level(&self) -> u32 {
        self.section_level
    }

    pub fn page_num(&self) -> Option<u32> {
        self.page_num
    }

    pub fn line_num(&self) -> Option<u32> {
        self.line_num
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn pipeline_run_id(&self) -> Option<&str> {
        self.pipeline_run_id.as_deref()
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    /// Applies the propagation rule in place: provenance fields are copied
    /// from the parent; `line_num` is kept when already refined; a
    /// `Custom` chunk type is replaced by the parent's.
    pub fn inherit_from(&mut self, parent: &Metadata) {
        self.document_id = parent.document_id.clone();
        self.section_id = parent.section_id.clone();
        self.section_title = parent.section_title.clone();
        self.section_level = parent.section_level;
        self.page_num = parent.page_num;
        self.pipeline_run_id = parent.pipeline_run_id.clone();
        self.source_type = parent.source_type.clone();
        if self.line_num.is_none() {
            self.line_num = parent.line_num;
        }
        if self.chunk_type == ChunkType::Custom {
            self.chunk_type = parent.chunk_type;
        }
    }

    /// Replaces the section context (used when a detector attaches chunks
    /// to their sections after splitting).
    pub fn relocate_section(
        &mut self,
        section_id: impl Into<String>,
        section_title: impl Into<String>,
        section_level: u32,
    ) {
        self.section_id = section_id.into();
        self.section_title = section_title.into();
        self.section_level = section_level.max(1);
    }

    /// Stamps the owning document and page, used by the executor when a
    /// chunk processor ran over raw page text.
    pub fn stamp_origin(&mut self, document_id: impl Into<String>, page_num: u32) {
        self.document_id = document_id.into();
        self.page_num = Some(page_num.max(1));
    }
}

/// Display-text truncation threshold for serialized chunks.
const DISPLAY_TEXT_LIMIT: usize = 50;

/// A text fragment with provenance, hierarchy, and extraction results.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    id: String,
    text: String,
    meta: Metadata,
    parent_id: Option<String>,
    children: Vec<Chunk>,
    extraction_results: Map<String, Value>,
}

impl Chunk {
    /// Creates a chunk with a fresh identifier.
    pub fn new(text: impl Into<String>, meta: Metadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            meta,
            parent_id: None,
            children: Vec::new(),
            extraction_results: Map::new(),
        }
    }

    /// Creates a chunk with a caller-provided identifier (deserialization,
    /// tests).
    pub fn with_id(id: impl Into<String>, text: impl Into<String>, meta: Metadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            meta,
            parent_id: None,
            children: Vec::new(),
            extraction_results: Map::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn children(&self) -> &[Chunk] {
        &self.children
    }

    pub fn extraction_results(&self) -> &Map<String, Value> {
        &self.extraction_results
    }

    pub fn set_extraction_results(&mut self, results: Map<String, Value>) {
        self.extraction_results = results;
    }

    pub fn with_extraction_results(mut self, results: Map<String, Value>) -> Self {
        self.extraction_results = results;
        self
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Attaches a child fragment, stamping its `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::ValidationError` when the child already belongs
    /// to a different parent.
    pub fn add_child(&mut self, mut child: Chunk) -> Result<(), EtlError> {
        if let Some(existing) = &child.parent_id {
            if existing != &self.id {
                return Err(EtlError::ValidationError(format!(
                    "parent id mismatch: expected {}, got {}",
                    self.id, existing
                )));
            }
        }
        child.parent_id = Some(self.id.clone());
        self.children.push(child);
        Ok(())
    }

    /// All descendants, depth-first.
    pub fn descendants(&self) -> Vec<&Chunk> {
        let mut result = Vec::new();
        for child in &self.children {
            result.push(child);
            result.extend(child.descendants());
        }
        result
    }

    /// Container chunks (with children) may have empty text; leaf chunks
    /// may not.
    pub fn validate(&self) -> Result<(), EtlError> {
        if self.text.is_empty() && self.children.is_empty() {
            return Err(EtlError::ValidationError(format!(
                "chunk {} has neither text nor children",
                self.id
            )));
        }
        for child in &self.children {
            if child.parent_id.as_deref() != Some(self.id.as_str()) {
                return Err(EtlError::ValidationError(format!(
                    "child {} does not reference parent {}",
                    child.id, self.id
                )));
            }
            child.validate()?;
        }
        Ok(())
    }

    /// Serializes to the record form (truncated display text plus the
    /// complete original).
    pub fn to_record(&self) -> ChunkRecord {
        let display_text = if self.text.chars().count() > DISPLAY_TEXT_LIMIT {
            let truncated: String = self.text.chars().take(DISPLAY_TEXT_LIMIT).collect();
            format!("{}...", truncated)
        } else {
            self.text.clone()
        };

        ChunkRecord {
            id: self.id.clone(),
            text: display_text,
            original_text: self.text.clone(),
            metadata: self.meta.clone(),
            parent_id: self.parent_id.clone(),
            children_count: self.children.len(),
            children: self.children.iter().map(Chunk::to_record).collect(),
            extraction_count: self.extraction_results.len(),
            extraction_results: self.extraction_results.clone(),
        }
    }

    /// Reconstructs a chunk (and its subtree) from the record form.
    pub fn from_record(record: ChunkRecord) -> Result<Self, EtlError> {
        let mut chunk = Chunk {
            id: record.id,
            text: record.original_text,
            meta: record.metadata,
            parent_id: record.parent_id,
            children: Vec::new(),
            extraction_results: record.extraction_results,
        };
        for child_record in record.children {
            let child = Chunk::from_record(child_record)?;
            chunk.add_child(child)?;
        }
        Ok(chunk)
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short_id: String = self.id.chars().take(8).collect();
        let section: String = self.meta.section_title.chars().take(20).collect();
        write!(
            f,
            "Chunk(id={}, type={}, page={}, section={})",
            short_id,
            self.meta.chunk_type,
            self.meta
                .page_num
                .map(|n| n.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            section
        )
    }
}

/// Wire/database form of a chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    /// Truncated for display; `original_text` holds the full content.
    pub text: String,
    pub original_text: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children_count: usize,
    #[serde(default)]
    pub children: Vec<ChunkRecord>,
    #[serde(default)]
    pub extraction_count: usize,
    #[serde(default)]
    pub extraction_results: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> Metadata {
        Metadata::new("doc-1", "sec-1", "Overview", 1)
            .unwrap()
            .with_page_num(2)
            .unwrap()
            .with_chunk_type(ChunkType::Paragraph)
            .with_pipeline_run_id("run-1")
            .with_source_type("pdf")
    }

    #[test]
    fn test_metadata_rejects_empty_ids() {
        assert!(Metadata::new("", "sec", "t", 1).is_err());
        assert!(Metadata::new("doc", "", "t", 1).is_err());
        assert!(Metadata::new("doc", "sec", "t", 0).is_err());
    }

    #[test]
    fn test_metadata_rejects_zero_page_and_line() {
        let base = Metadata::new("doc", "sec", "t", 1).unwrap();
        assert!(base.clone().with_page_num(0).is_err());
        assert!(base.with_line_num(0).is_err());
    }

    #[test]
    fn test_derived_metadata_propagates_provenance() {
        let parent = meta();
        let child = parent.derived(ChunkType::Sentence);
        assert_eq!(child.document_id(), parent.document_id());
        assert_eq!(child.section_id(), parent.section_id());
        assert_eq!(child.section_title(), parent.section_title());
        assert_eq!(child.section_level(), parent.section_level());
        assert_eq!(child.page_num(), parent.page_num());
        assert_eq!(child.pipeline_run_id(), parent.pipeline_run_id());
        assert_eq!(child.source_type(), parent.source_type());
        assert_eq!(child.chunk_type(), ChunkType::Sentence);
    }

    #[test]
    fn test_add_child_stamps_parent_id() {
        let mut parent = Chunk::new("parent text", meta());
        let child = Chunk::new("child", meta());
        parent.add_child(child).unwrap();
        assert_eq!(parent.children()[0].parent_id(), Some(parent.id()));
    }

    #[test]
    fn test_add_child_rejects_foreign_parent() {
        let mut parent = Chunk::new("parent", meta());
        let mut child = Chunk::new("child", meta());
        child.parent_id = Some("someone-else".to_string());
        assert!(parent.add_child(child).is_err());
    }

    #[test]
    fn test_descendants_are_depth_first() {
        let mut root = Chunk::new("root", meta());
        let mut mid = Chunk::new("mid", meta());
        mid.add_child(Chunk::new("leaf", meta())).unwrap();
        root.add_child(mid).unwrap();
        let texts: Vec<&str> = root.descendants().iter().map(|c| c.text()).collect();
        assert_eq!(texts, vec!["mid", "leaf"]);
    }

    #[test]
    fn test_empty_text_requires_children() {
        let lone = Chunk::new("", meta());
        assert!(lone.validate().is_err());

        let mut container = Chunk::new("", meta());
        container.add_child(Chunk::new("content", meta())).unwrap();
        assert!(container.validate().is_ok());
    }

    #[test]
    fn test_record_truncates_display_but_preserves_original() {
        let long_text = "x".repeat(80);
        let chunk = Chunk::new(long_text.clone(), meta());
        let record = chunk.to_record();
        assert_eq!(record.text.chars().count(), 53); // 50 + "..."
        assert!(record.text.ends_with("..."));
        assert_eq!(record.original_text, long_text);

        let restored = Chunk::from_record(record).unwrap();
        assert_eq!(restored.text(), long_text);
    }

    #[test]
    fn test_record_round_trip_preserves_everything() {
        let mut results = Map::new();
        results.insert("pattern".to_string(), Value::String(r"\d+".to_string()));
        let mut chunk = Chunk::new("42 items", meta()).with_extraction_results(results);
        chunk.add_child(Chunk::new("child text", meta())).unwrap();

        let json = serde_json::to_string(&chunk.to_record()).unwrap();
        let record: ChunkRecord = serde_json::from_str(&json).unwrap();
        let restored = Chunk::from_record(record).unwrap();

        assert_eq!(restored.id(), chunk.id());
        assert_eq!(restored.meta(), chunk.meta());
        assert_eq!(restored.extraction_results(), chunk.extraction_results());
        assert_eq!(restored.children().len(), 1);
        assert_eq!(restored.children()[0].text(), "child text");
    }

    #[test]
    fn test_display_truncates_section_title() {
        let meta = Metadata::new("doc", "sec", "A very long section title indeed", 1).unwrap();
        let chunk = Chunk::new("text", meta);
        let shown = chunk.to_string();
        assert!(shown.contains("A very long section "));
        assert!(!shown.contains("indeed"));
    }
}
