// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Exporter
//!
//! Streams chunks into a directory as JSON, CSV, or TXT; gzip compression
//! appends `.gz` to the file name.
//!
//! JSON layout per chunk:
//! `{id, text, meta:{document_id, page_num, section_id, section_title,
//! section_level, chunk_type, pipeline_run_id, source_type, line_num},
//! extraction_results, exported_at}`.
//!
//! CSV header row:
//! `ID, Text, Document ID, Page Num, Section ID, Section Title,
//! Section Level, Chunk Type, Exported At`.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use serde_json::{json, Value};

use text_etl_domain::entities::chunk::Chunk;
use text_etl_domain::entities::pipeline_run::PipelineRun;
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_exporter::{ChunkExporter, ExporterStatus};

/// Output layout for file exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Txt,
}

impl ExportFormat {
    fn default_file_name(self) -> &'static str {
        match self {
            ExportFormat::Json => "chunks.json",
            ExportFormat::Csv => "chunks.csv",
            ExportFormat::Txt => "chunks.txt",
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileExporterConfig {
    output_path: PathBuf,
    #[serde(default)]
    format: Option<ExportFormat>,
    #[serde(default)]
    compress: bool,
}

/// File-based sink for chunks and run metadata.
pub struct FileExporter {
    format: ExportFormat,
    output_dir: Option<PathBuf>,
    compress: bool,
    connected_at: Option<DateTime<Utc>>,
}

impl FileExporter {
    pub fn new() -> Self {
        Self {
            format: ExportFormat::Json,
            output_dir: None,
            compress: false,
            connected_at: None,
        }
    }

    /// Exporter pinned to one format (the JSON exporter step kind ignores
    /// any `format` parameter).
    pub fn with_format(format: ExportFormat) -> Self {
        Self {
            format,
            ..Self::new()
        }
    }

    fn output_dir(&self) -> Result<&Path, EtlError> {
        self.output_dir
            .as_deref()
            .ok_or_else(|| EtlError::InvalidConfiguration("file exporter is not connected".to_string()))
    }

    fn chunk_record(chunk: &Chunk, exported_at: &DateTime<Utc>) -> Value {
        json!({
            "id": chunk.id(),
            "text": chunk.text(),
            "meta": {
                "document_id": chunk.meta().document_id(),
                "page_num": chunk.meta().page_num(),
                "section_id": chunk.meta().section_id(),
                "section_title": chunk.meta().section_title(),
                "section_level": chunk.meta().section_level(),
                "chunk_type": chunk.meta().chunk_type().to_string(),
                "pipeline_run_id": chunk.meta().pipeline_run_id(),
                "source_type": chunk.meta().source_type(),
                "line_num": chunk.meta().line_num(),
            },
            "extraction_results": Value::Object(chunk.extraction_results().clone()),
            "exported_at": exported_at.to_rfc3339(),
        })
    }

    fn render_json(chunks: &[Chunk]) -> Result<Vec<u8>, EtlError> {
        let exported_at = Utc::now();
        let records: Vec<Value> = chunks
            .iter()
            .map(|c| Self::chunk_record(c, &exported_at))
            .collect();
        Ok(serde_json::to_vec_pretty(&records)?)
    }

    fn render_csv(chunks: &[Chunk]) -> Result<Vec<u8>, EtlError> {
        let exported_at = Utc::now().to_rfc3339();
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "ID",
                "Text",
                "Document ID",
                "Page Num",
                "Section ID",
                "Section Title",
                "Section Level",
                "Chunk Type",
                "Exported At",
            ])
            .map_err(|e| EtlError::IoError(format!("csv write: {}", e)))?;
        for chunk in chunks {
            writer
                .write_record([
                    chunk.id(),
                    chunk.text(),
                    chunk.meta().document_id(),
                    &chunk
                        .meta()
                        .page_num()
                        .map(|n| n.to_string())
                        .unwrap_or_default(),
                    chunk.meta().section_id(),
                    chunk.meta().section_title(),
                    &chunk.meta().section_level().to_string(),
                    &chunk.meta().chunk_type().to_string(),
                    &exported_at,
                ])
                .map_err(|e| EtlError::IoError(format!("csv write: {}", e)))?;
        }
        writer
            .into_inner()
            .map_err(|e| EtlError::IoError(format!("csv flush: {}", e)))
    }

    fn render_txt(chunks: &[Chunk]) -> Vec<u8> {
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(chunk.text());
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Writes `bytes` to the destination, gzipping when configured.
    async fn write_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf, EtlError> {
        let dir = self.output_dir()?.to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        if self.compress {
            let path = dir.join(format!("{}.gz", file_name));
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(&bytes)
                .map_err(|e| EtlError::IoError(format!("gzip: {}", e)))?;
            let compressed = encoder
                .finish()
                .map_err(|e| EtlError::IoError(format!("gzip: {}", e)))?;
            tokio::fs::write(&path, compressed).await?;
            Ok(path)
        } else {
            let path = dir.join(file_name);
            tokio::fs::write(&path, bytes).await?;
            Ok(path)
        }
    }
}

impl Default for FileExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkExporter for FileExporter {
    async fn connect(&mut self, config: &Value) -> Result<(), EtlError> {
        let parsed: FileExporterConfig = serde_json::from_value(config.clone())
            .map_err(|e| EtlError::InvalidConfiguration(format!("file exporter config: {}", e)))?;
        if let Some(format) = parsed.format {
            self.format = format;
        }
        self.compress = parsed.compress;
        tokio::fs::create_dir_all(&parsed.output_path).await?;
        self.output_dir = Some(parsed.output_path);
        self.connected_at = Some(Utc::now());
        Ok(())
    }

    async fn batch_insert(&self, chunks: &[Chunk], destination: &str) -> Result<(), EtlError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let file_name = if destination.is_empty() {
            self.format.default_file_name()
        } else {
            destination
        };
        let bytes = match self.format {
            ExportFormat::Json => Self::render_json(chunks)?,
            ExportFormat::Csv => Self::render_csv(chunks)?,
            ExportFormat::Txt => Self::render_txt(chunks),
        };
        self.write_file(file_name, bytes).await?;
        Ok(())
    }

    async fn export_run_metadata(&self, run: &PipelineRun) -> Result<(), EtlError> {
        let record = json!({
            "id": run.id,
            "pipeline_id": run.pipeline_id,
            "start_time": run.start_time.to_rfc3339(),
            "end_time": run.end_time.map(|t| t.to_rfc3339()),
            "status": run.status,
            "processed_count": run.processed_count,
            "success_count": run.success_count,
            "error_count": run.error_count,
            "errors": run.errors,
            "metadata": run.metadata,
            "exported_at": Utc::now().to_rfc3339(),
        });
        let file_name = format!(
            "run_{}_{}.json",
            run.id,
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        self.write_file(&file_name, serde_json::to_vec_pretty(&record)?)
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), EtlError> {
        self.output_dir = None;
        self.connected_at = None;
        Ok(())
    }

    fn status(&self) -> ExporterStatus {
        ExporterStatus {
            backend: "file".to_string(),
            connected: self.output_dir.is_some(),
            destination: self.output_dir.as_ref().map(|p| p.display().to_string()),
            connected_at: self.connected_at,
        }
    }
}
