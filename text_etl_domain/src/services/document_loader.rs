// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document Loader Port
//!
//! Contract for format-specific adapters that produce the uniform
//! [`Document`] form: `load(request) -> Document`, `supports(path)`, and a
//! cheap `metadata(path)` probe that avoids a full load.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::entities::document::Document;
use crate::error::EtlError;
use crate::value_objects::header_rules::HeaderStyleDefinition;

/// How virtual pages are assembled for formats without physical pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationPolicy {
    /// Fixed number of paragraphs per page.
    ByParagraphs(usize),
    /// Approximate character budget per page.
    ByCharBudget(usize),
}

impl PaginationPolicy {
    pub const DEFAULT_PARAGRAPHS_PER_PAGE: usize = 50;
    pub const DEFAULT_CHARS_PER_PAGE: usize = 2750;
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        PaginationPolicy::ByParagraphs(Self::DEFAULT_PARAGRAPHS_PER_PAGE)
    }
}

/// A load request: the source path plus the style configuration used for
/// load-time section detection.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub path: PathBuf,
    pub header_styles: Vec<HeaderStyleDefinition>,
    pub pagination: PaginationPolicy,
}

impl LoadRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header_styles: Vec::new(),
            pagination: PaginationPolicy::default(),
        }
    }

    pub fn with_header_styles(mut self, styles: Vec<HeaderStyleDefinition>) -> Self {
        self.header_styles = styles;
        self
    }

    pub fn with_pagination(mut self, policy: PaginationPolicy) -> Self {
        self.pagination = policy;
        self
    }
}

/// Format-specific adapter producing a uniform [`Document`].
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Loads the document, preserving per-span font attributes as blocks
    /// and running load-time section detection when styles are configured.
    async fn load(&self, request: &LoadRequest) -> Result<Document, EtlError>;

    /// Whether this loader handles the path's format.
    fn supports(&self, path: &Path) -> bool;

    /// Lightweight metadata probe without a full load.
    async fn metadata(&self, path: &Path) -> Result<Map<String, Value>, EtlError>;
}
