// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Delimiter Splitter
//!
//! Splits text by a literal or regex delimiter (`use_regex`), optionally
//! keeping the delimiter attached to the preceding part
//! (`preserve_delimiter`). Parts are trimmed and empties skipped. Result
//! chunks carry `chunk_type = CUSTOM`.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use text_etl_domain::entities::chunk::{Chunk, ChunkType};
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_processor::{ChunkProcessor, ProcessorInput};

use super::page_metadata;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DelimiterParams {
    delimiter: String,
    use_regex: bool,
    preserve_delimiter: bool,
}

impl Default for DelimiterParams {
    fn default() -> Self {
        Self {
            delimiter: ";".to_string(),
            use_regex: false,
            preserve_delimiter: false,
        }
    }
}

pub struct DelimiterSplitter;

fn split_text(text: &str, params: &DelimiterParams) -> Result<Vec<String>, EtlError> {
    let raw_parts: Vec<String> = if params.use_regex {
        let re = Regex::new(&params.delimiter)?;
        if params.preserve_delimiter {
            let mut parts = Vec::new();
            let mut last_end = 0;
            for m in re.find_iter(text) {
                parts.push(text[last_end..m.end()].to_string());
                last_end = m.end();
            }
            parts.push(text[last_end..].to_string());
            parts
        } else {
            re.split(text).map(str::to_string).collect()
        }
    } else if params.preserve_delimiter {
        let pieces: Vec<&str> = text.split(params.delimiter.as_str()).collect();
        let last = pieces.len().saturating_sub(1);
        pieces
            .iter()
            .enumerate()
            .map(|(i, piece)| {
                if i < last {
                    format!("{}{}", piece, params.delimiter)
                } else {
                    piece.to_string()
                }
            })
            .collect()
    } else {
        text.split(params.delimiter.as_str()).map(str::to_string).collect()
    };

    Ok(raw_parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect())
}

impl ChunkProcessor for DelimiterSplitter {
    fn process(&self, input: ProcessorInput<'_>, params: &Value) -> Result<Vec<Chunk>, EtlError> {
        let params: DelimiterParams = serde_json::from_value(params.clone()).unwrap_or_default();

        match input {
            ProcessorInput::Document(document) => {
                let mut all = Vec::new();
                for page in document.pages() {
                    for part in split_text(&page.raw_text, &params)? {
                        let meta = page_metadata(document, page.number, ChunkType::Custom)?;
                        all.push(Chunk::new(part, meta));
                    }
                }
                Ok(all)
            }
            ProcessorInput::Chunks(chunks) => {
                let mut all = Vec::new();
                for chunk in chunks {
                    for part in split_text(chunk.text(), &params)? {
                        all.push(Chunk::new(part, chunk.meta().derived(ChunkType::Custom)));
                    }
                }
                Ok(all)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use text_etl_domain::entities::chunk::Metadata;

    fn chunk_with(text: &str) -> Chunk {
        let meta = Metadata::new("doc-1", "sec-1", "Intro", 1).unwrap();
        Chunk::new(text, meta)
    }

    #[test]
    fn test_default_semicolon_delimiter() {
        let input = [chunk_with("a; b ;c;")];
        let out = DelimiterSplitter
            .process(ProcessorInput::Chunks(&input), &json!({"delimiter": ";"}))
            .unwrap();
        let texts: Vec<&str> = out.iter().map(Chunk::text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_regex_delimiter() {
        let input = [chunk_with("one1two22three")];
        let out = DelimiterSplitter
            .process(
                ProcessorInput::Chunks(&input),
                &json!({"delimiter": r"\d+", "use_regex": true}),
            )
            .unwrap();
        let texts: Vec<&str> = out.iter().map(Chunk::text).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_preserve_literal_delimiter() {
        let input = [chunk_with("a.b.c")];
        let out = DelimiterSplitter
            .process(
                ProcessorInput::Chunks(&input),
                &json!({"delimiter": ".", "preserve_delimiter": true}),
            )
            .unwrap();
        let texts: Vec<&str> = out.iter().map(Chunk::text).collect();
        assert_eq!(texts, vec!["a.", "b.", "c"]);
    }

    #[test]
    fn test_preserve_regex_delimiter() {
        let input = [chunk_with("x--y-z")];
        let out = DelimiterSplitter
            .process(
                ProcessorInput::Chunks(&input),
                &json!({"delimiter": "-+", "use_regex": true, "preserve_delimiter": true}),
            )
            .unwrap();
        let texts: Vec<&str> = out.iter().map(Chunk::text).collect();
        assert_eq!(texts, vec!["x--", "y-", "z"]);
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let input = [chunk_with("abc")];
        let result = DelimiterSplitter.process(
            ProcessorInput::Chunks(&input),
            &json!({"delimiter": "([", "use_regex": true}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_result_type_is_custom() {
        let input = [chunk_with("a;b")];
        let out = DelimiterSplitter
            .process(ProcessorInput::Chunks(&input), &json!({}))
            .unwrap();
        assert_eq!(out[0].meta().chunk_type(), ChunkType::Custom);
    }
}
