// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Exporter Port
//!
//! Uniform sink contract over SQL engines, document stores, and file
//! formats. Exporters are side-effect only: `batch_insert` never mutates
//! or replaces the chunk list, so downstream steps observe the pre-export
//! chunks, and inserts are idempotent (upsert keyed by chunk id).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::entities::chunk::Chunk;
use crate::entities::pipeline_run::PipelineRun;
use crate::error::EtlError;

/// Connection status snapshot for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterStatus {
    pub backend: String,
    pub connected: bool,
    pub destination: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl ExporterStatus {
    pub fn disconnected(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            connected: false,
            destination: None,
            connected_at: None,
        }
    }
}

/// A pluggable sink for chunks and run metadata.
#[async_trait]
pub trait ChunkExporter: Send + Sync {
    /// Establishes the connection / prepares the destination.
    async fn connect(&mut self, config: &Value) -> Result<(), EtlError>;

    /// Writes the chunks to `destination` (table, collection, or file
    /// name). Must be idempotent for repeated calls with the same chunks.
    async fn batch_insert(&self, chunks: &[Chunk], destination: &str) -> Result<(), EtlError>;

    /// Writes the run's metadata record.
    async fn export_run_metadata(&self, run: &PipelineRun) -> Result<(), EtlError>;

    /// Releases the connection.
    async fn close(&mut self) -> Result<(), EtlError>;

    /// Current connection status.
    fn status(&self) -> ExporterStatus;
}
