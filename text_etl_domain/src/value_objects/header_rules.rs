// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Header Style Rules
//!
//! User-configurable rules for hierarchical header detection: style
//! definitions matched against font attributes, admission filters, and
//! exact-text rules. The [`crate::services::header_detector`] service
//! evaluates these rules against document spans.
//!
//! Filters are case-insensitive unless a rule states otherwise. An invalid
//! user-supplied pattern never admits text (filters fail closed).

use serde::{Deserialize, Serialize};

/// Admission filter applied after a style definition matches.
///
/// Predicates are evaluated conjunctively, in this order: length checks,
/// starts/ends, include words (ANY), exclude words (NONE), contains
/// pattern, include regex (match required), exclude regex (match
/// forbidden).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderFilter {
    #[serde(default)]
    pub include_words: Vec<String>,
    #[serde(default)]
    pub exclude_words: Vec<String>,
    #[serde(default)]
    pub include_regex: Option<String>,
    #[serde(default)]
    pub exclude_regex: Option<String>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub starts_with: Option<String>,
    #[serde(default)]
    pub ends_with: Option<String>,
    #[serde(default)]
    pub contains_pattern: Option<String>,
}

impl HeaderFilter {
    /// Whether the text passes every configured predicate.
    pub fn admits(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        let trimmed = lowered.trim();

        if let Some(min) = self.min_length {
            if text.chars().count() < min {
                return false;
            }
        }
        if let Some(max) = self.max_length {
            if text.chars().count() > max {
                return false;
            }
        }

        if let Some(prefix) = &self.starts_with {
            if !trimmed.starts_with(&prefix.to_lowercase()) {
                return false;
            }
        }
        if let Some(suffix) = &self.ends_with {
            if !trimmed.ends_with(&suffix.to_lowercase()) {
                return false;
            }
        }

        if !self.include_words.is_empty()
            && !self.include_words.iter().any(|w| lowered.contains(&w.to_lowercase()))
        {
            return false;
        }
        if self.exclude_words.iter().any(|w| lowered.contains(&w.to_lowercase())) {
            return false;
        }

        if let Some(pattern) = &self.contains_pattern {
            if !insensitive_search(pattern, trimmed) {
                return false;
            }
        }
        if let Some(pattern) = &self.include_regex {
            if !insensitive_search(pattern, text) {
                return false;
            }
        }
        if let Some(pattern) = &self.exclude_regex {
            if insensitive_search(pattern, text) {
                return false;
            }
        }

        true
    }
}

/// Case-insensitive regex search; an invalid pattern matches nothing.
fn insensitive_search(pattern: &str, text: &str) -> bool {
    match regex::RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

/// Matches a literal heading, optionally case-sensitive and whole-word.
///
/// In whole-word mode the heading matches only where it is immediately
/// followed by a newline or the end of the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactHeadingRule {
    pub heading_text: String,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_whole_word")]
    pub whole_word: bool,
}

fn default_level() -> u32 {
    1
}

fn default_whole_word() -> bool {
    true
}

impl ExactHeadingRule {
    pub fn new(heading_text: impl Into<String>, level: u32) -> Self {
        Self {
            heading_text: heading_text.into(),
            level,
            case_sensitive: false,
            whole_word: true,
        }
    }

    /// Whether the rule matches anywhere in `text`.
    pub fn matches(&self, text: &str) -> bool {
        let (haystack, needle) = if self.case_sensitive {
            (text.to_string(), self.heading_text.clone())
        } else {
            (text.to_lowercase(), self.heading_text.to_lowercase())
        };

        if needle.is_empty() {
            return false;
        }

        if !self.whole_word {
            return haystack.contains(&needle);
        }

        for (start, _) in haystack.match_indices(&needle) {
            let end = start + needle.len();
            match haystack[end..].chars().next() {
                None => return true,
                Some('\n') => return true,
                Some(_) => {}
            }
        }
        false
    }
}

/// A style pattern that assigns one header level.
///
/// Attribute checks are skipped when the attribute is absent on either
/// side; `font_size` uses approximate equality with 0.1 tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderStyleDefinition {
    pub level: u32,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub is_bold: Option<bool>,
    #[serde(default)]
    pub is_italic: Option<bool>,
    #[serde(default)]
    pub starts_with_pattern: Option<String>,
    #[serde(default)]
    pub contains_pattern: Option<String>,
    #[serde(default)]
    pub filter: Option<HeaderFilter>,
    #[serde(default)]
    pub exact_heading_rules: Vec<ExactHeadingRule>,
}

/// Tolerance for font-size comparison, absorbing extraction rounding.
pub const FONT_SIZE_TOLERANCE: f32 = 0.1;

impl HeaderStyleDefinition {
    pub fn new(level: u32) -> Self {
        Self {
            level,
            font_size: None,
            is_bold: None,
            is_italic: None,
            starts_with_pattern: None,
            contains_pattern: None,
            filter: None,
            exact_heading_rules: Vec::new(),
        }
    }

    /// Whether the observed style attributes satisfy this definition.
    ///
    /// The filter is not consulted here; callers apply it after a style
    /// match (see the header detector).
    pub fn matches_style(
        &self,
        text: &str,
        font_size: Option<f32>,
        font_flags: Option<u32>,
    ) -> bool {
        if let (Some(expected), Some(observed)) = (self.font_size, font_size) {
            if (expected - observed).abs() > FONT_SIZE_TOLERANCE {
                return false;
            }
        }

        if let (Some(expected), Some(flags)) = (self.is_bold, font_flags) {
            if expected != crate::entities::document::FontFlags(flags).is_bold() {
                return false;
            }
        }
        if let (Some(expected), Some(flags)) = (self.is_italic, font_flags) {
            if expected != crate::entities::document::FontFlags(flags).is_italic() {
                return false;
            }
        }

        if let Some(pattern) = &self.starts_with_pattern {
            match regex::Regex::new(pattern) {
                // Anchor on the trimmed text
                Ok(re) => {
                    if !re.is_match(text.trim()) || re.find(text.trim()).map(|m| m.start()) != Some(0) {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }

        if let Some(pattern) = &self.contains_pattern {
            match regex::Regex::new(pattern) {
                Ok(re) => {
                    if !re.is_match(text) {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }

        true
    }
}
