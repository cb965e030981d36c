// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DOCX Loader
//!
//! Walks the paragraphs a DOCX parser yields, derives font attributes
//! from each paragraph's first run, and groups paragraphs into virtual
//! pages so downstream components have a well-defined `page_num`. The
//! parser library is an external collaborator behind the [`DocxBackend`]
//! port.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use text_etl_domain::entities::document::{Document, DocumentFormat, FontFlags, TextSpan};
use text_etl_domain::error::EtlError;
use text_etl_domain::services::document_loader::{DocumentLoader, LoadRequest};
use text_etl_domain::services::header_detector::HeaderDetector;

use super::paginator::{ParagraphUnit, VirtualPaginator};

/// One run inside a paragraph, with the style attributes the parser
/// exposes.
#[derive(Debug, Clone, Default)]
pub struct DocxRun {
    pub text: String,
    pub font_size_pt: Option<f32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
}

/// One decoded paragraph.
#[derive(Debug, Clone, Default)]
pub struct DocxParagraph {
    pub text: String,
    /// Paragraph style name, e.g. "Heading 1".
    pub style: Option<String>,
    pub runs: Vec<DocxRun>,
}

/// Full decoded form of a DOCX file.
#[derive(Debug, Clone, Default)]
pub struct DocxContent {
    pub paragraphs: Vec<DocxParagraph>,
    pub title: String,
    pub author: String,
}

/// Port over the external DOCX decoding library.
pub trait DocxBackend: Send + Sync {
    fn read(&self, path: &Path) -> Result<DocxContent, EtlError>;

    fn probe(&self, path: &Path) -> Result<Map<String, Value>, EtlError>;
}

/// Virtual-paginating DOCX loader over a [`DocxBackend`].
pub struct DocxLoader {
    backend: Arc<dyn DocxBackend>,
}

impl DocxLoader {
    pub fn new(backend: Arc<dyn DocxBackend>) -> Self {
        Self { backend }
    }

    /// Style span derived from the paragraph's first run.
    fn derive_span(paragraph: &DocxParagraph) -> Option<TextSpan> {
        if paragraph.text.trim().is_empty() {
            return None;
        }
        let first_run = paragraph.runs.first();
        let flags = FontFlags::new(
            first_run.and_then(|r| r.bold).unwrap_or(false),
            first_run.and_then(|r| r.italic).unwrap_or(false),
        );
        Some(TextSpan {
            text: paragraph.text.clone(),
            font_size: first_run.and_then(|r| r.font_size_pt),
            font_flags: flags.0,
            bbox: None,
        })
    }
}

#[async_trait]
impl DocumentLoader for DocxLoader {
    async fn load(&self, request: &LoadRequest) -> Result<Document, EtlError> {
        let content = self.backend.read(&request.path)?;

        let units: Vec<ParagraphUnit> = content
            .paragraphs
            .iter()
            .map(|paragraph| ParagraphUnit {
                text: paragraph.text.clone(),
                style: paragraph.style.clone(),
                span: Self::derive_span(paragraph),
            })
            .collect();

        let mut document = Document::new(request.path.clone(), DocumentFormat::Docx);
        document.title = content.title;
        document.author = content.author;
        for page in VirtualPaginator::paginate(&units, request.pagination)? {
            document.add_page(page)?;
        }

        if !request.header_styles.is_empty() {
            HeaderDetector::new(request.header_styles.clone()).detect_sections(&mut document)?;
        }

        Ok(document)
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("docx"))
            .unwrap_or(false)
    }

    async fn metadata(&self, path: &Path) -> Result<Map<String, Value>, EtlError> {
        let mut map = self.backend.probe(path)?;
        map.insert("format".to_string(), json!("DOCX"));
        if let Ok(fs_meta) = tokio::fs::metadata(path).await {
            map.insert("file_size".to_string(), json!(fs_meta.len()));
        }
        Ok(map)
    }
}
