// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Chain Integration Test
//!
//! Chains splitters and the extractor through the executor and checks the
//! metadata propagation invariant: every produced chunk carries its
//! parent's `document_id`, `section_id`, and `page_num`.

use serde_json::json;

use crate::common::{engine, write_fixture};
use text_etl_bootstrap::shutdown::CancellationToken;
use text_etl::application::document_executor::DocumentProcessor;
use text_etl_domain::entities::chunk::ChunkType;
use text_etl_domain::entities::pipeline::{PipelineConfig, StepConfig, StepKind};

fn loader() -> StepConfig {
    StepConfig::new(StepKind::DocumentLoader, "load")
        .with_id("load")
        .with_params(json!({"source_path": "/tmp"}))
}

#[tokio::test]
async fn test_paragraph_then_sentence_chain_propagates_metadata() {
    let engine = engine().await;
    let file = write_fixture(
        ".txt",
        b"Dr. Smith went home. He slept.\n\nSecond paragraph here. It has two sentences.\n",
    );

    let config = PipelineConfig::new(
        "chain",
        vec![
            loader(),
            StepConfig::new(StepKind::ParagraphSplitter, "paragraphs")
                .with_id("paragraphs")
                .with_input("load"),
            StepConfig::new(StepKind::SentenceSplitter, "sentences")
                .with_id("sentences")
                .with_input("paragraphs"),
        ],
    );

    let report = engine
        .executor
        .process_document(&config, file.path(), &json!({}), &CancellationToken::never())
        .await
        .unwrap();

    assert_eq!(report.chunks.len(), 4);
    assert_eq!(report.chunks[0].text(), "Dr. Smith went home.");
    assert_eq!(report.chunks[1].text(), "He slept.");

    // Propagation invariant: provenance fields survive every split
    let first = report.chunks[0].meta();
    for chunk in &report.chunks {
        let meta = chunk.meta();
        assert_eq!(meta.document_id(), first.document_id());
        assert_eq!(meta.section_id(), first.section_id());
        assert_eq!(meta.page_num(), Some(1));
        assert_eq!(meta.chunk_type(), ChunkType::Sentence);
        assert_eq!(meta.pipeline_run_id(), Some(report.run.id.as_str()));
    }
}

#[tokio::test]
async fn test_delimiter_splitter_boundary_behavior() {
    let engine = engine().await;
    let file = write_fixture(".txt", b"a; b ;c;\n");

    let config = PipelineConfig::new(
        "delimiters",
        vec![
            loader(),
            StepConfig::new(StepKind::DelimiterSplitter, "split")
                .with_id("split")
                .with_params(json!({"delimiter": ";"}))
                .with_input("load"),
        ],
    );

    let report = engine
        .executor
        .process_document(&config, file.path(), &json!({}), &CancellationToken::never())
        .await
        .unwrap();

    let texts: Vec<&str> = report.chunks.iter().map(|c| c.text()).collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_regex_extractor_over_line_chunks() {
    let engine = engine().await;
    let file = write_fixture(".txt", b"invoice 1001 paid\ninvoice 1002 open\nno number here\n");

    let config = PipelineConfig::new(
        "extract",
        vec![
            loader(),
            StepConfig::new(StepKind::LineSplitter, "lines")
                .with_id("lines")
                .with_input("load"),
            StepConfig::new(StepKind::RegexExtractor, "numbers")
                .with_id("numbers")
                .with_params(json!({"patterns": [{"name": "invoice", "pattern": r"invoice (?P<num>\d+)"}]}))
                .with_input("lines"),
        ],
    );

    let report = engine
        .executor
        .process_document(&config, file.path(), &json!({}), &CancellationToken::never())
        .await
        .unwrap();

    assert_eq!(report.chunks.len(), 2);
    for (chunk, expected) in report.chunks.iter().zip(["1001", "1002"]) {
        let groups = chunk.extraction_results()["matched_groups"].as_object().unwrap();
        assert_eq!(groups["num"], json!(expected));
        assert_eq!(chunk.extraction_results()["name"], json!("invoice"));
        // Extractor output keeps the line chunk's provenance
        assert!(chunk.meta().line_num().is_some());
    }
}

#[tokio::test]
async fn test_line_splitter_empty_document() {
    let engine = engine().await;
    let file = write_fixture(".txt", b"");

    let config = PipelineConfig::new(
        "empty",
        vec![
            loader(),
            StepConfig::new(StepKind::LineSplitter, "lines")
                .with_id("lines")
                .with_input("load"),
        ],
    );

    let report = engine
        .executor
        .process_document(&config, file.path(), &json!({}), &CancellationToken::never())
        .await
        .unwrap();
    assert!(report.chunks.is_empty());
}
