// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document Entity
//!
//! A `Document` is the uniform in-memory form every loader produces: an
//! ordered collection of [`Page`]s (page numbers unique and dense) and a
//! flat collection of [`Section`]s forming a forest keyed by `parent_id`.
//!
//! Pages hold both the raw page text (what chunk processors consume) and
//! the typed [`Block`]s the loader preserved, so the style-based header
//! detector can read per-span font attributes after loading.
//!
//! ## Font Flags
//!
//! Span style is carried as a PDF-style flag word: bold is bit 4, italic
//! bit 1, underline bit 6, strikeout bit 7. [`FontFlags`] wraps the raw
//! word with named accessors.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EtlError;

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
    Unknown,
}

impl DocumentFormat {
    /// Maps a file extension to a format; unknown extensions yield
    /// `Unknown` (dispatch failure is the loader factory's concern).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => DocumentFormat::Pdf,
            "docx" => DocumentFormat::Docx,
            "txt" => DocumentFormat::Txt,
            _ => DocumentFormat::Unknown,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// PDF-style font attribute flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontFlags(pub u32);

impl FontFlags {
    pub const ITALIC: u32 = 1 << 1;
    pub const BOLD: u32 = 1 << 4;
    pub const UNDERLINE: u32 = 1 << 6;
    pub const STRIKEOUT: u32 = 1 << 7;

    pub fn new(bold: bool, italic: bool) -> Self {
        let mut flags = 0;
        if bold {
            flags |= Self::BOLD;
        }
        if italic {
            flags |= Self::ITALIC;
        }
        Self(flags)
    }

    pub fn is_bold(self) -> bool {
        self.0 & Self::BOLD != 0
    }

    pub fn is_italic(self) -> bool {
        self.0 & Self::ITALIC != 0
    }

    pub fn is_underline(self) -> bool {
        self.0 & Self::UNDERLINE != 0
    }

    pub fn is_strikeout(self) -> bool {
        self.0 & Self::STRIKEOUT != 0
    }
}

/// One styled span inside a text block, preserved verbatim from the
/// source parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub font_flags: u32,
    /// `[x0, y0, x1, y1]` in page coordinates, when the parser provides it.
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
}

impl TextSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: None,
            font_flags: 0,
            bbox: None,
        }
    }

    pub fn styled(text: impl Into<String>, font_size: f32, flags: FontFlags) -> Self {
        Self {
            text: text.into(),
            font_size: Some(font_size),
            font_flags: flags.0,
            bbox: None,
        }
    }

    pub fn flags(&self) -> FontFlags {
        FontFlags(self.font_flags)
    }
}

/// Typed content block on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Span-preserving text block (PDF path).
    Text { text: String, spans: Vec<TextSpan> },
    /// Paragraph block with derived style (DOCX/TXT path).
    Paragraph {
        text: String,
        #[serde(default)]
        style: Option<String>,
        spans: Vec<TextSpan>,
        #[serde(default)]
        line_number: Option<u32>,
    },
}

impl Block {
    pub fn text(&self) -> &str {
        match self {
            Block::Text { text, .. } => text,
            Block::Paragraph { text, .. } => text,
        }
    }

    pub fn spans(&self) -> &[TextSpan] {
        match self {
            Block::Text { spans, .. } => spans,
            Block::Paragraph { spans, .. } => spans,
        }
    }
}

/// A physical or virtual page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub raw_text: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn new(number: u32, raw_text: impl Into<String>) -> Result<Self, EtlError> {
        if number < 1 {
            return Err(EtlError::ValidationError(
                "page number must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            number,
            raw_text: raw_text.into(),
            blocks: Vec::new(),
        })
    }

    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = blocks;
        self
    }
}

/// A detected document section; sections form a forest via `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub level: u32,
    pub start_page: u32,
    pub end_page: u32,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl Section {
    pub fn new(
        title: impl Into<String>,
        level: u32,
        start_page: u32,
        end_page: u32,
    ) -> Result<Self, EtlError> {
        if level < 1 {
            return Err(EtlError::ValidationError(
                "section level must be at least 1".to_string(),
            ));
        }
        if start_page > end_page {
            return Err(EtlError::ValidationError(
                "section start page cannot exceed end page".to_string(),
            ));
        }
        let short: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        Ok(Self {
            id: format!("sec_{}", short),
            title: title.into(),
            level,
            start_page,
            end_page,
            parent_id: None,
        })
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Structured document produced by a loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub path: PathBuf,
    pub format: DocumentFormat,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub created_at: DateTime<Utc>,
    pages: Vec<Page>,
    sections: Vec<Section>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, format: DocumentFormat) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path: path.into(),
            format,
            title: String::new(),
            author: String::new(),
            created_at: Utc::now(),
            pages: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Adds a page, keeping the collection ordered.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::ValidationError` when a page with the same number
    /// already exists.
    pub fn add_page(&mut self, page: Page) -> Result<(), EtlError> {
        if self.pages.iter().any(|p| p.number == page.number) {
            return Err(EtlError::ValidationError(format!(
                "page with number {} already exists",
                page.number
            )));
        }
        self.pages.push(page);
        self.pages.sort_by_key(|p| p.number);
        Ok(())
    }

    /// Page numbers must be dense: 1..=n with no gaps.
    pub fn validate_pagination(&self) -> Result<(), EtlError> {
        for (index, page) in self.pages.iter().enumerate() {
            let expected = index as u32 + 1;
            if page.number != expected {
                return Err(EtlError::ValidationError(format!(
                    "page numbers are not dense: expected {}, found {}",
                    expected, page.number
                )));
            }
        }
        Ok(())
    }

    pub fn add_section(&mut self, section: Section) -> Result<(), EtlError> {
        if self.sections.iter().any(|s| s.id == section.id) {
            return Err(EtlError::ValidationError(format!(
                "section with id {} already exists",
                section.id
            )));
        }
        self.sections.push(section);
        Ok(())
    }

    pub fn section_by_id(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    /// All sections whose page span covers `page_num`.
    pub fn sections_for_page(&self, page_num: u32) -> Vec<&Section> {
        self.sections
            .iter()
            .filter(|s| s.start_page <= page_num && page_num <= s.end_page)
            .collect()
    }

    pub fn parent_section(&self, section_id: &str) -> Option<&Section> {
        let parent_id = self.section_by_id(section_id)?.parent_id.as_deref()?;
        self.section_by_id(parent_id)
    }

    /// All transitive children of a section.
    pub fn child_sections(&self, section_id: &str) -> Vec<&Section> {
        let mut result = Vec::new();
        for section in self.sections.iter().filter(|s| s.parent_id.as_deref() == Some(section_id)) {
            result.push(section);
            result.extend(self.child_sections(&section.id));
        }
        result
    }

    pub fn file_stem(&self) -> &str {
        Path::new(&self.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_flag_bits() {
        let flags = FontFlags(1 << 4 | 1 << 1);
        assert!(flags.is_bold());
        assert!(flags.is_italic());
        assert!(!flags.is_underline());
        assert!(!flags.is_strikeout());
        assert!(FontFlags(1 << 6).is_underline());
        assert!(FontFlags(1 << 7).is_strikeout());
    }

    #[test]
    fn test_page_number_must_be_positive() {
        assert!(Page::new(0, "text").is_err());
        assert!(Page::new(1, "text").is_ok());
    }

    #[test]
    fn test_duplicate_page_numbers_rejected() {
        let mut doc = Document::new("a.txt", DocumentFormat::Txt);
        doc.add_page(Page::new(1, "first").unwrap()).unwrap();
        assert!(doc.add_page(Page::new(1, "again").unwrap()).is_err());
    }

    #[test]
    fn test_pages_kept_sorted_and_dense() {
        let mut doc = Document::new("a.txt", DocumentFormat::Txt);
        doc.add_page(Page::new(2, "second").unwrap()).unwrap();
        doc.add_page(Page::new(1, "first").unwrap()).unwrap();
        assert_eq!(doc.pages()[0].number, 1);
        assert!(doc.validate_pagination().is_ok());

        let mut gappy = Document::new("b.txt", DocumentFormat::Txt);
        gappy.add_page(Page::new(1, "one").unwrap()).unwrap();
        gappy.add_page(Page::new(3, "three").unwrap()).unwrap();
        assert!(gappy.validate_pagination().is_err());
    }

    #[test]
    fn test_section_page_span_validation() {
        assert!(Section::new("Intro", 1, 3, 2).is_err());
        assert!(Section::new("Intro", 0, 1, 1).is_err());
        assert!(Section::new("Intro", 1, 1, 2).is_ok());
    }

    #[test]
    fn test_section_forest_navigation() {
        let mut doc = Document::new("a.pdf", DocumentFormat::Pdf);
        let root = Section::new("Chapter", 1, 1, 10).unwrap();
        let root_id = root.id.clone();
        doc.add_section(root).unwrap();

        let child = Section::new("Part", 2, 2, 5).unwrap().with_parent(root_id.clone());
        let child_id = child.id.clone();
        doc.add_section(child).unwrap();

        let grandchild = Section::new("Detail", 3, 3, 3)
            .unwrap()
            .with_parent(child_id.clone());
        doc.add_section(grandchild).unwrap();

        assert_eq!(doc.parent_section(&child_id).unwrap().id, root_id);
        assert_eq!(doc.child_sections(&root_id).len(), 2);
    }

    #[test]
    fn test_sections_for_page() {
        let mut doc = Document::new("a.pdf", DocumentFormat::Pdf);
        doc.add_section(Section::new("Wide", 1, 1, 5).unwrap()).unwrap();
        doc.add_section(Section::new("Narrow", 2, 3, 3).unwrap()).unwrap();
        assert_eq!(doc.sections_for_page(3).len(), 2);
        assert_eq!(doc.sections_for_page(5).len(), 1);
        assert_eq!(doc.sections_for_page(6).len(), 0);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_extension("PDF"), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_extension("docx"), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_extension("md"), DocumentFormat::Unknown);
    }
}
