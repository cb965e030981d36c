// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # End-to-End Export Pipeline Test
//!
//! Full three-step pipelines through the manager: load, split, export -
//! against the JSON, CSV, and SQL sinks.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::common::{engine, engine_with, write_fixture, CalmProbe, CannedPdfBackend};
use text_etl::application::pipeline_manager::ExecutionMode;
use text_etl::infrastructure::loaders::{LoaderFactory, PdfLoader};
use text_etl_domain::entities::pipeline::{PipelineConfig, StepConfig, StepKind};
use text_etl_domain::entities::pipeline_run::RunStatus;
use text_etl_domain::repositories::pipeline_repository::RunRepository;

fn three_step_pipeline(name: &str, export: StepConfig) -> PipelineConfig {
    PipelineConfig::new(
        name,
        vec![
            StepConfig::new(StepKind::DocumentLoader, "load")
                .with_id("load")
                .with_params(json!({"source_path": "/tmp"})),
            StepConfig::new(StepKind::LineSplitter, "split")
                .with_id("split")
                .with_input("load"),
            export.with_id("export").with_input("split"),
        ],
    )
}

/// Three-step PDF pipeline: LOADER -> LINE_SPLITTER -> JSON_EXPORTER over
/// a one-page PDF containing "A\nB\n". The exported file holds two
/// objects with texts {A, B}, the same document id, page 1, type line.
#[tokio::test]
async fn test_pdf_to_json_three_step_pipeline() {
    let mut factory = LoaderFactory::standard();
    factory.register(
        "pdf",
        Arc::new(PdfLoader::new(Arc::new(CannedPdfBackend::single_page("A\nB\n")))),
    );
    let engine = engine_with(factory, Arc::new(CalmProbe)).await;

    let out_dir = tempfile::tempdir().unwrap();
    let export = StepConfig::new(StepKind::JsonExporter, "export").with_params(json!({
        "output_path": out_dir.path(),
        "file_name": "chunks.json",
    }));
    let id = engine
        .manager
        .create_pipeline(three_step_pipeline("pdf_lines_json", export))
        .await
        .unwrap();

    let pdf = write_fixture(".pdf", b"%PDF-1.4 stand-in");
    let run_id = engine
        .manager
        .execute(
            &id,
            vec![pdf.path().to_path_buf()],
            json!({}),
            ExecutionMode::Parallel,
        )
        .await
        .unwrap();

    let run = RunRepository::find_by_id(&*engine.store, &run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let raw = std::fs::read_to_string(out_dir.path().join("chunks.json")).unwrap();
    let records: Vec<Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(records.len(), 2);

    let texts: Vec<&str> = records.iter().map(|r| r["text"].as_str().unwrap()).collect();
    assert!(texts.contains(&"A"));
    assert!(texts.contains(&"B"));
    assert_eq!(
        records[0]["meta"]["document_id"],
        records[1]["meta"]["document_id"]
    );
    for record in &records {
        assert_eq!(record["meta"]["page_num"], json!(1));
        assert_eq!(record["meta"]["chunk_type"], json!("line"));
        assert!(record["exported_at"].is_string());
    }
}

#[tokio::test]
async fn test_txt_to_csv_pipeline() {
    let engine = engine().await;
    let out_dir = tempfile::tempdir().unwrap();
    let export = StepConfig::new(StepKind::FileExporter, "export").with_params(json!({
        "output_path": out_dir.path(),
        "format": "csv",
        "file_name": "chunks.csv",
    }));
    let id = engine
        .manager
        .create_pipeline(three_step_pipeline("txt_lines_csv", export))
        .await
        .unwrap();

    let file = write_fixture(".txt", b"first\nsecond\nthird\n");
    engine
        .manager
        .execute(&id, vec![file.path().to_path_buf()], json!({}), ExecutionMode::Sequential)
        .await
        .unwrap();

    let raw = std::fs::read_to_string(out_dir.path().join("chunks.csv")).unwrap();
    let mut lines = raw.lines();
    assert_eq!(
        lines.next().unwrap(),
        "ID,Text,Document ID,Page Num,Section ID,Section Title,Section Level,Chunk Type,Exported At"
    );
    assert_eq!(lines.count(), 3);
}

/// The SQL sink is idempotent across repeated runs: re-exporting the same
/// chunk ids upserts instead of duplicating.
#[tokio::test]
async fn test_sqlite_export_upsert_is_idempotent() {
    let engine = engine().await;
    let db_dir = tempfile::tempdir().unwrap();
    let db_url = format!("sqlite://{}?mode=rwc", db_dir.path().join("target.db").display());

    let export = StepConfig::new(StepKind::DbExporter, "export").with_params(json!({
        "db_config": {"url": db_url},
        "table_name": "exported_chunks",
    }));
    let id = engine
        .manager
        .create_pipeline(three_step_pipeline("txt_lines_sql", export))
        .await
        .unwrap();

    let file = write_fixture(".txt", b"alpha\nbeta\n");
    for _ in 0..2 {
        engine
            .manager
            .execute(&id, vec![file.path().to_path_buf()], json!({}), ExecutionMode::Sequential)
            .await
            .unwrap();
    }

    // Two runs produced fresh chunk ids each time, so the table holds
    // four rows; a duplicate insert of the same ids would not add more.
    let pool = sqlx::SqlitePool::connect(&db_url).await.unwrap();
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM exported_chunks")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 4);
}

/// Gzip-compressed JSON export appends `.gz`.
#[tokio::test]
async fn test_compressed_json_export() {
    let engine = engine().await;
    let out_dir = tempfile::tempdir().unwrap();
    let export = StepConfig::new(StepKind::JsonExporter, "export").with_params(json!({
        "output_path": out_dir.path(),
        "file_name": "chunks.json",
        "compress": true,
    }));
    let id = engine
        .manager
        .create_pipeline(three_step_pipeline("txt_lines_gzip", export))
        .await
        .unwrap();

    let file = write_fixture(".txt", b"zipped line\n");
    engine
        .manager
        .execute(&id, vec![file.path().to_path_buf()], json!({}), ExecutionMode::Parallel)
        .await
        .unwrap();

    assert!(out_dir.path().join("chunks.json.gz").exists());
    assert!(!out_dir.path().join("chunks.json").exists());
}
