// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sentence Splitter
//!
//! Splits text at sentence-ending punctuation (`.`, `!`, `?`, `:`)
//! followed by whitespace, while refusing to split after honorific
//! abbreviations (`Mr.`, `Dr.`) and dotted abbreviations or decimals
//! (`e.g.`, `3.1.4`). Result chunks carry `chunk_type = SENTENCE`.
//!
//! The protection rules mirror a lookbehind-guarded split: a candidate
//! boundary is rejected when the three characters ending at it match
//! `[A-Z][a-z]\.`, or the four characters match `\w\.\w` plus the
//! punctuation itself.

use serde_json::Value;

use text_etl_domain::entities::chunk::{Chunk, ChunkType};
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_processor::{ChunkProcessor, ProcessorInput};

use super::page_metadata;

pub struct SentenceSplitter;

fn is_boundary_punct(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | ':')
}

/// Whether the candidate boundary at `index` sits inside a protected
/// abbreviation.
fn is_protected(chars: &[char], index: usize) -> bool {
    // Honorifics: "Dr.", "Mr." - uppercase, lowercase, dot
    if chars[index] == '.'
        && index >= 2
        && chars[index - 2].is_uppercase()
        && chars[index - 1].is_lowercase()
    {
        return true;
    }
    // Dotted abbreviations and decimals: "e.g.", "3.1."
    if index >= 3
        && chars[index - 3].is_alphanumeric()
        && chars[index - 2] == '.'
        && chars[index - 1].is_alphanumeric()
    {
        return true;
    }
    false
}

/// Splits `text` into sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if is_boundary_punct(chars[i])
            && chars.get(i + 1).map(|c| c.is_whitespace()).unwrap_or(false)
            && !is_protected(&chars, i)
        {
            let sentence: String = chars[start..=i].iter().collect();
            let sentence = sentence.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            // Skip the whitespace run after the boundary
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            start = i;
            continue;
        }
        i += 1;
    }

    if start < chars.len() {
        let tail: String = chars[start..].iter().collect();
        let tail = tail.trim().to_string();
        if !tail.is_empty() {
            sentences.push(tail);
        }
    }

    sentences
}

impl ChunkProcessor for SentenceSplitter {
    fn process(&self, input: ProcessorInput<'_>, _params: &Value) -> Result<Vec<Chunk>, EtlError> {
        match input {
            ProcessorInput::Document(document) => {
                let mut all = Vec::new();
                for page in document.pages() {
                    for sentence in split_sentences(&page.raw_text) {
                        let meta = page_metadata(document, page.number, ChunkType::Sentence)?;
                        all.push(Chunk::new(sentence, meta));
                    }
                }
                Ok(all)
            }
            ProcessorInput::Chunks(chunks) => {
                let mut all = Vec::new();
                for chunk in chunks {
                    for sentence in split_sentences(chunk.text()) {
                        all.push(Chunk::new(sentence, chunk.meta().derived(ChunkType::Sentence)));
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
    fn test_honorifics_do_not_split() {
        assert_eq!(
            split_sentences("Dr. Smith went home. He slept."),
            vec!["Dr. Smith went home.", "He slept."]
        );
        assert_eq!(
            split_sentences("Mr. Jones left."),
            vec!["Mr. Jones left."]
        );
    }

    #[test]
    fn test_dotted_abbreviations_do_not_split() {
        assert_eq!(
            split_sentences("Use e.g. apples. Then stop."),
            vec!["Use e.g. apples.", "Then stop."]
        );
    }

    #[test]
    fn test_decimals_do_not_split() {
        assert_eq!(split_sentences("Pi is 3.14 roughly."), vec!["Pi is 3.14 roughly."]);
    }

    #[test]
    fn test_question_exclamation_and_colon_split() {
        assert_eq!(
            split_sentences("Really? Yes! Note: done"),
            vec!["Really?", "Yes!", "Note:", "done"]
        );
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_processor_sets_sentence_type() {
        let input = [chunk_with("One. Two.")];
        let out = SentenceSplitter
            .process(ProcessorInput::Chunks(&input), &json!({}))
            .unwrap();
        assert_eq!(out.len(), 2);
        for chunk in &out {
            assert_eq!(chunk.meta().chunk_type(), ChunkType::Sentence);
            assert_eq!(chunk.meta().document_id(), "doc-1");
        }
    }
}
