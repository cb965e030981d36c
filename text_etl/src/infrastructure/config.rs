// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration Files
//!
//! JSON configuration loading for the two file kinds the engine accepts:
//!
//! - **Pipeline config**: `{name, description, steps: [...], schedule,
//!   source_config, target_config, version}`, deserializing straight into
//!   [`PipelineConfig`].
//! - **Style config**: `{header_assignments: [{level, style: {...},
//!   <filter fields>, exact_heading_rules: [...]}]}`, converted into the
//!   domain's [`HeaderStyleDefinition`] list.

use std::path::Path;

use serde::Deserialize;

use text_etl_domain::entities::pipeline::PipelineConfig;
use text_etl_domain::error::EtlError;
use text_etl_domain::value_objects::header_rules::{
    ExactHeadingRule, HeaderFilter, HeaderStyleDefinition,
};

/// Loads and validates a pipeline configuration file.
pub async fn load_pipeline_config(path: &Path) -> Result<PipelineConfig, EtlError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let config: PipelineConfig = serde_json::from_str(&raw).map_err(|e| {
        EtlError::InvalidConfiguration(format!("pipeline config {}: {}", path.display(), e))
    })?;
    config.validate()?;
    Ok(config)
}

/// The `style` object inside a header assignment.
#[derive(Debug, Default, Deserialize)]
struct StyleSpec {
    #[serde(default)]
    font_size: Option<f32>,
    #[serde(default)]
    is_bold: Option<bool>,
    #[serde(default)]
    is_italic: Option<bool>,
    #[serde(default)]
    starts_with_pattern: Option<String>,
    #[serde(default)]
    contains_pattern: Option<String>,
}

/// One exact heading rule in a style config file.
#[derive(Debug, Deserialize)]
struct ExactRuleSpec {
    heading_text: String,
    #[serde(default)]
    level: Option<u32>,
    #[serde(default)]
    case_sensitive: bool,
    #[serde(default = "default_whole_word")]
    whole_word: bool,
}

fn default_whole_word() -> bool {
    true
}

/// One header assignment: a style bound to a level, with filter fields
/// sitting beside the style object.
#[derive(Debug, Deserialize)]
struct HeaderAssignment {
    level: u32,
    #[serde(default)]
    style: StyleSpec,
    #[serde(default)]
    include_words: Vec<String>,
    #[serde(default)]
    exclude_words: Vec<String>,
    #[serde(default)]
    include_regex: Option<String>,
    #[serde(default)]
    exclude_regex: Option<String>,
    #[serde(default)]
    min_length: Option<usize>,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    starts_with: Option<String>,
    #[serde(default)]
    ends_with: Option<String>,
    #[serde(default)]
    contains_pattern: Option<String>,
    #[serde(default)]
    exact_heading_rules: Vec<ExactRuleSpec>,
}

#[derive(Debug, Deserialize)]
struct StyleConfigFile {
    #[serde(default)]
    header_assignments: Vec<HeaderAssignment>,
}

impl HeaderAssignment {
    fn into_definition(self) -> HeaderStyleDefinition {
        let filter = HeaderFilter {
            include_words: self.include_words,
            exclude_words: self.exclude_words,
            include_regex: self.include_regex,
            exclude_regex: self.exclude_regex,
            min_length: self.min_length,
            max_length: self.max_length,
            starts_with: self.starts_with,
            ends_with: self.ends_with,
            contains_pattern: self.contains_pattern,
        };
        let has_filter = filter != HeaderFilter::default();

        let level = self.level;
        HeaderStyleDefinition {
            level,
            font_size: self.style.font_size,
            is_bold: self.style.is_bold,
            is_italic: self.style.is_italic,
            starts_with_pattern: self.style.starts_with_pattern,
            contains_pattern: self.style.contains_pattern,
            filter: has_filter.then_some(filter),
            exact_heading_rules: self
                .exact_heading_rules
                .into_iter()
                .map(|rule| ExactHeadingRule {
                    heading_text: rule.heading_text,
                    level: rule.level.unwrap_or(level),
                    case_sensitive: rule.case_sensitive,
                    whole_word: rule.whole_word,
                })
                .collect(),
        }
    }
}

/// Parses a style config document into header style definitions.
pub fn parse_style_config(raw: &str) -> Result<Vec<HeaderStyleDefinition>, EtlError> {
    let file: StyleConfigFile = serde_json::from_str(raw)
        .map_err(|e| EtlError::InvalidConfiguration(format!("style config: {}", e)))?;
    Ok(file
        .header_assignments
        .into_iter()
        .map(HeaderAssignment::into_definition)
        .collect())
}

/// Loads a style config file.
pub async fn load_style_config(path: &Path) -> Result<Vec<HeaderStyleDefinition>, EtlError> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_style_config(&raw)
}
