// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document Loaders
//!
//! Format-specific adapters producing the uniform [`Document`] form. The
//! byte-level decoding of PDF and DOCX stays behind the [`PdfBackend`] and
//! [`DocxBackend`] ports (the concrete parser libraries are external
//! collaborators); everything above the port - document assembly, span
//! preservation, font-attribute derivation, virtual pagination, load-time
//! section detection - lives here.
//!
//! The [`LoaderFactory`] maps file extensions to loaders; unknown
//! extensions fail with `UnsupportedFormat`.

pub mod docx;
pub mod paginator;
pub mod pdf;
pub mod txt;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use text_etl_domain::entities::document::Document;
use text_etl_domain::error::EtlError;
use text_etl_domain::services::document_loader::{DocumentLoader, LoadRequest};

pub use docx::{DocxBackend, DocxContent, DocxLoader, DocxParagraph, DocxRun};
pub use paginator::VirtualPaginator;
pub use pdf::{PdfBackend, PdfContent, PdfLoader, PdfPage};
pub use txt::TxtLoader;

/// Maps file extensions to loader instances.
pub struct LoaderFactory {
    loaders: HashMap<String, Arc<dyn DocumentLoader>>,
}

impl LoaderFactory {
    /// Empty factory.
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Factory with the TXT loader registered. PDF and DOCX loaders are
    /// added through [`LoaderFactory::register`] once their parser
    /// backends are wired in.
    pub fn standard() -> Self {
        let mut factory = Self::new();
        factory.register("txt", Arc::new(TxtLoader::new()));
        factory
    }

    /// Registers a loader for an extension (lowercased).
    pub fn register(&mut self, extension: &str, loader: Arc<dyn DocumentLoader>) {
        self.loaders.insert(extension.to_lowercase(), loader);
    }

    fn extension_of(path: &Path) -> Option<String> {
        path.extension().and_then(|e| e.to_str()).map(str::to_lowercase)
    }

    /// Loader for the path's extension.
    ///
    /// # Errors
    ///
    /// `EtlError::UnsupportedFormat` when no loader handles the extension.
    pub fn create(&self, path: &Path) -> Result<Arc<dyn DocumentLoader>, EtlError> {
        let extension = Self::extension_of(path).unwrap_or_default();
        self.loaders.get(&extension).cloned().ok_or_else(|| {
            let mut supported: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
            supported.sort_unstable();
            EtlError::UnsupportedFormat(format!(
                "{}: supported formats are {}",
                path.display(),
                supported.join(", ")
            ))
        })
    }

    pub fn supports(&self, path: &Path) -> bool {
        Self::extension_of(path)
            .map(|ext| self.loaders.contains_key(&ext))
            .unwrap_or(false)
    }

    pub fn supported_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.loaders.keys().cloned().collect();
        formats.sort_unstable();
        formats
    }

    /// Loads a document through the loader bound to its extension.
    pub async fn load(&self, request: &LoadRequest) -> Result<Document, EtlError> {
        self.create(&request.path)?.load(request).await
    }
}

impl Default for LoaderFactory {
    fn default() -> Self {
        Self::standard()
    }
}
