// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Style-Based Header Detector
//!
//! Assigns hierarchical header levels to text from font attributes,
//! patterns, and exact-text rules.
//!
//! ## Algorithm
//!
//! 1. Exact heading rules (collected across all style definitions) are
//!    evaluated first; the first match wins.
//! 2. Otherwise style definitions are scanned in declaration order. A
//!    definition matches when every configured attribute check holds
//!    (checks with a null attribute are skipped): font size within 0.1,
//!    bold/italic parity with the flag bits, the starts-with pattern
//!    anchored on trimmed text, and the contains pattern found anywhere.
//! 3. A matching definition's [`HeaderFilter`] must admit the text;
//!    a rejected definition does not stop the scan.
//! 4. The first admitted definition wins and contributes its level.
//!
//! When applied to a whole [`Document`], spans of each page are walked in
//! order and every detected header appends a [`Section`] with
//! `start_page == end_page == page number`.

use crate::entities::document::{Document, Section};
use crate::error::EtlError;
use crate::value_objects::header_rules::{ExactHeadingRule, HeaderStyleDefinition};

/// Evaluates header style definitions against text spans.
#[derive(Debug, Clone, Default)]
pub struct HeaderDetector {
    definitions: Vec<HeaderStyleDefinition>,
    exact_rules: Vec<ExactHeadingRule>,
}

impl HeaderDetector {
    /// Builds a detector; exact rules from every definition are hoisted so
    /// they always run before style matching.
    pub fn new(definitions: Vec<HeaderStyleDefinition>) -> Self {
        let exact_rules = definitions
            .iter()
            .flat_map(|d| d.exact_heading_rules.iter().cloned())
            .collect();
        Self {
            definitions,
            exact_rules,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.exact_rules.is_empty()
    }

    pub fn definitions(&self) -> &[HeaderStyleDefinition] {
        &self.definitions
    }

    /// Header level for the given text and observed style, or `None`.
    pub fn detect_level(
        &self,
        text: &str,
        font_size: Option<f32>,
        font_flags: Option<u32>,
    ) -> Option<u32> {
        for rule in &self.exact_rules {
            if rule.matches(text) {
                return Some(rule.level);
            }
        }

        for definition in &self.definitions {
            if !definition.matches_style(text, font_size, font_flags) {
                continue;
            }
            if let Some(filter) = &definition.filter {
                if !filter.admits(text) {
                    continue;
                }
            }
            return Some(definition.level);
        }

        None
    }

    /// Walks every page's blocks and spans in order, appending a section
    /// for each detected header.
    pub fn detect_sections(&self, document: &mut Document) -> Result<usize, EtlError> {
        if self.is_empty() {
            return Ok(0);
        }

        let mut found = Vec::new();
        for page in document.pages() {
            for block in &page.blocks {
                let spans = block.spans();
                if spans.is_empty() {
                    // Style-less block: fall back to the block text alone
                    let text = block.text().trim();
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(level) = self.detect_level(text, None, None) {
                        found.push((text.to_string(), level, page.number));
                    }
                    continue;
                }
                for span in spans {
                    let text = span.text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(level) =
                        self.detect_level(text, span.font_size, Some(span.font_flags))
                    {
                        found.push((text.to_string(), level, page.number));
                    }
                }
            }
        }

        let count = found.len();
        for (title, level, page_number) in found {
            document.add_section(Section::new(title, level, page_number, page_number)?)?;
        }
        Ok(count)
    }
}
