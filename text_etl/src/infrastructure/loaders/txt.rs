// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # TXT Loader
//!
//! Plain-text loader: one block per non-empty line, virtual pagination per
//! the configured policy, and load-time section detection against the
//! configured header styles (pattern rules only, since plain text carries
//! no font attributes).

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use text_etl_domain::entities::document::{Document, DocumentFormat, TextSpan};
use text_etl_domain::error::EtlError;
use text_etl_domain::services::document_loader::{DocumentLoader, LoadRequest};
use text_etl_domain::services::header_detector::HeaderDetector;

use super::paginator::{ParagraphUnit, VirtualPaginator};

pub struct TxtLoader;

impl TxtLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TxtLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentLoader for TxtLoader {
    async fn load(&self, request: &LoadRequest) -> Result<Document, EtlError> {
        let content = tokio::fs::read_to_string(&request.path).await?;

        // One unit per line; blank lines participate in pagination but
        // produce no blocks.
        let units: Vec<ParagraphUnit> = content
            .lines()
            .map(|line| ParagraphUnit {
                text: line.to_string(),
                style: None,
                span: if line.trim().is_empty() {
                    None
                } else {
                    Some(TextSpan::plain(line.trim()))
                },
            })
            .collect();

        let mut document = Document::new(request.path.clone(), DocumentFormat::Txt);
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
            .map(|e| e.eq_ignore_ascii_case("txt"))
            .unwrap_or(false)
    }

    async fn metadata(&self, path: &Path) -> Result<Map<String, Value>, EtlError> {
        let file_size = tokio::fs::metadata(path).await?.len();
        let content = tokio::fs::read_to_string(path).await?;
        let line_count = content.lines().count();
        let char_count = content.chars().count();

        let mut map = Map::new();
        map.insert("format".to_string(), json!("TXT"));
        map.insert("file_size".to_string(), json!(file_size));
        map.insert("lines".to_string(), json!(line_count));
        map.insert("characters".to_string(), json!(char_count));
        Ok(map)
    }
}
