// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # PDF Loader
//!
//! Builds the uniform [`Document`] from the typed spans a PDF parser
//! yields. The parser itself is an external collaborator behind the
//! [`PdfBackend`] port (its contract: per-page spans with text, font
//! size, flag word, and bounding box); the loader preserves the spans
//! verbatim as blocks so the header detector can read style attributes,
//! and runs load-time section detection when styles are configured.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use text_etl_domain::entities::document::{Block, Document, DocumentFormat, Page, TextSpan};
use text_etl_domain::error::EtlError;
use text_etl_domain::services::document_loader::{DocumentLoader, LoadRequest};
use text_etl_domain::services::header_detector::HeaderDetector;

/// One decoded PDF page.
#[derive(Debug, Clone, Default)]
pub struct PdfPage {
    pub spans: Vec<TextSpan>,
}

/// Full decoded form of a PDF file.
#[derive(Debug, Clone, Default)]
pub struct PdfContent {
    pub pages: Vec<PdfPage>,
    pub title: String,
    pub author: String,
}

/// Port over the external PDF decoding library.
pub trait PdfBackend: Send + Sync {
    /// Decodes the whole file into pages of typed spans.
    fn read(&self, path: &Path) -> Result<PdfContent, EtlError>;

    /// Cheap metadata probe (page count, document info) without decoding
    /// page content.
    fn probe(&self, path: &Path) -> Result<Map<String, Value>, EtlError>;
}

/// Span-preserving PDF loader over a [`PdfBackend`].
pub struct PdfLoader {
    backend: Arc<dyn PdfBackend>,
}

impl PdfLoader {
    pub fn new(backend: Arc<dyn PdfBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    async fn load(&self, request: &LoadRequest) -> Result<Document, EtlError> {
        let content = self.backend.read(&request.path)?;

        let mut document = Document::new(request.path.clone(), DocumentFormat::Pdf);
        document.title = content.title;
        document.author = content.author;

        for (index, pdf_page) in content.pages.into_iter().enumerate() {
            let raw_text = pdf_page
                .spans
                .iter()
                .map(|s| s.text.as_str())
                .filter(|t| !t.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            let block = Block::Text {
                text: raw_text.clone(),
                spans: pdf_page.spans,
            };
            let page = Page::new(index as u32 + 1, raw_text)?.with_blocks(vec![block]);
            document.add_page(page)?;
        }
        if document.pages().is_empty() {
            document.add_page(Page::new(1, "")?)?;
        }

        if !request.header_styles.is_empty() {
            HeaderDetector::new(request.header_styles.clone()).detect_sections(&mut document)?;
        }

        Ok(document)
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
    }

    async fn metadata(&self, path: &Path) -> Result<Map<String, Value>, EtlError> {
        let mut map = self.backend.probe(path)?;
        map.insert("format".to_string(), json!("PDF"));
        if let Ok(fs_meta) = tokio::fs::metadata(path).await {
            map.insert("file_size".to_string(), json!(fs_meta.len()));
        }
        Ok(map)
    }
}
