// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Regex Extractor
//!
//! Extracts data with user-supplied patterns, given either as plain
//! strings or as `{name, pattern}` records. One chunk is emitted per
//! match; its `extraction_results` carry the pattern, the captured groups
//! (named groups keyed by name, otherwise by index), and the match byte
//! offsets.

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use text_etl_domain::entities::chunk::{Chunk, ChunkType, Metadata};
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_processor::{ChunkProcessor, ProcessorInput};

use super::page_metadata;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PatternSpec {
    Plain(String),
    Named {
        #[serde(default = "default_pattern_name")]
        name: String,
        pattern: String,
    },
}

fn default_pattern_name() -> String {
    "unnamed".to_string()
}

impl PatternSpec {
    fn pattern(&self) -> &str {
        match self {
            PatternSpec::Plain(p) => p,
            PatternSpec::Named { pattern, .. } => pattern,
        }
    }

    fn name(&self) -> Option<&str> {
        match self {
            PatternSpec::Plain(_) => None,
            PatternSpec::Named { name, .. } => Some(name),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ExtractorParams {
    #[serde(default)]
    patterns: Vec<PatternSpec>,
}

pub struct RegexExtractor;

fn extract_from_text(
    text: &str,
    spec: &PatternSpec,
    re: &Regex,
    base_meta: impl Fn() -> Result<Metadata, EtlError>,
) -> Result<Vec<Chunk>, EtlError> {
    let mut chunks = Vec::new();
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };

        let mut groups = Map::new();
        for (index, group) in caps.iter().enumerate() {
            groups.insert(
                index.to_string(),
                group.map(|g| Value::String(g.as_str().to_string())).unwrap_or(Value::Null),
            );
        }
        for name in re.capture_names().flatten() {
            groups.insert(
                name.to_string(),
                caps.name(name)
                    .map(|g| Value::String(g.as_str().to_string()))
                    .unwrap_or(Value::Null),
            );
        }

        let mut results = Map::new();
        if let Some(name) = spec.name() {
            results.insert("name".to_string(), json!(name));
        }
        results.insert("pattern".to_string(), json!(spec.pattern()));
        results.insert("matched_groups".to_string(), Value::Object(groups));
        results.insert("match_start".to_string(), json!(whole.start()));
        results.insert("match_end".to_string(), json!(whole.end()));

        chunks.push(Chunk::new(whole.as_str(), base_meta()?).with_extraction_results(results));
    }
    Ok(chunks)
}

impl ChunkProcessor for RegexExtractor {
    fn process(&self, input: ProcessorInput<'_>, params: &Value) -> Result<Vec<Chunk>, EtlError> {
        let params: ExtractorParams = serde_json::from_value(params.clone()).unwrap_or_default();
        if params.patterns.is_empty() {
            return Ok(Vec::new());
        }

        let compiled: Vec<(PatternSpec, Regex)> = params
            .patterns
            .into_iter()
            .map(|spec| Regex::new(spec.pattern()).map(|re| (spec, re)))
            .collect::<Result<_, _>>()?;

        let mut all = Vec::new();
        match input {
            ProcessorInput::Document(document) => {
                for page in document.pages() {
                    for (spec, re) in &compiled {
                        all.extend(extract_from_text(&page.raw_text, spec, re, || {
                            page_metadata(document, page.number, ChunkType::Custom)
                        })?);
                    }
                }
            }
            ProcessorInput::Chunks(chunks) => {
                for chunk in chunks {
                    for (spec, re) in &compiled {
                        all.extend(extract_from_text(chunk.text(), spec, re, || {
                            Ok(chunk.meta().derived(ChunkType::Custom))
                        })?);
                    }
                }
            }
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use text_etl_domain::entities::document::{Document, DocumentFormat, Page};

    fn chunk_with(text: &str) -> Chunk {
        let meta = Metadata::new("doc-1", "sec-1", "Intro", 1)
            .unwrap()
            .with_pipeline_run_id("run-1");
        Chunk::new(text, meta)
    }

    #[test]
    fn test_no_patterns_yields_empty() {
        let input = [chunk_with("text")];
        let out = RegexExtractor
            .process(ProcessorInput::Chunks(&input), &json!({}))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_plain_pattern_emits_one_chunk_per_match() {
        let input = [chunk_with("order 12 and order 97")];
        let out = RegexExtractor
            .process(ProcessorInput::Chunks(&input), &json!({"patterns": [r"\d+"]}))
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text(), "12");
        assert_eq!(out[1].text(), "97");

        let results = out[0].extraction_results();
        assert_eq!(results["pattern"], json!(r"\d+"));
        assert_eq!(results["match_start"], json!(6));
        assert_eq!(results["match_end"], json!(8));
    }

    #[test]
    fn test_named_pattern_records_name_and_groups() {
        let input = [chunk_with("from alice@example.com")];
        let out = RegexExtractor
            .process(
                ProcessorInput::Chunks(&input),
                &json!({"patterns": [{"name": "email", "pattern": r"(?P<user>\w+)@(?P<host>[\w.]+)"}]}),
            )
            .unwrap();
        assert_eq!(out.len(), 1);
        let results = out[0].extraction_results();
        assert_eq!(results["name"], json!("email"));
        let groups = results["matched_groups"].as_object().unwrap();
        assert_eq!(groups["user"], json!("alice"));
        assert_eq!(groups["host"], json!("example.com"));
        assert_eq!(groups["0"], json!("alice@example.com"));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let input = [chunk_with("text")];
        assert!(RegexExtractor
            .process(ProcessorInput::Chunks(&input), &json!({"patterns": ["(["]}))
            .is_err());
    }

    #[test]
    fn test_document_input_stamps_page() {
        let mut doc = Document::new("a.txt", DocumentFormat::Txt);
        doc.add_page(Page::new(1, "id: 7").unwrap()).unwrap();
        let out = RegexExtractor
            .process(ProcessorInput::Document(&doc), &json!({"patterns": [r"\d+"]}))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].meta().page_num(), Some(1));
        assert_eq!(out[0].meta().document_id(), doc.id);
    }

    #[test]
    fn test_provenance_propagated_from_parent() {
        let input = [chunk_with("value 3")];
        let out = RegexExtractor
            .process(ProcessorInput::Chunks(&input), &json!({"patterns": [r"\d"]}))
            .unwrap();
        assert_eq!(out[0].meta().pipeline_run_id(), Some("run-1"));
        assert_eq!(out[0].meta().section_id(), "sec-1");
    }
}
