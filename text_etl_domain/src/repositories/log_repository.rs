// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Log and Chunk Repository Ports
//!
//! Operational log entries are timestamped at write; readers sort by
//! `logged_at`. The chunk repository persists processed chunks keyed by
//! pipeline run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::chunk::Chunk;
use crate::error::EtlError;

/// Log severities persisted in the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(EtlError::ValidationError(format!(
                "invalid log level: {}",
                other
            ))),
        }
    }
}

/// One operational log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub pipeline_id: Option<String>,
    #[serde(default)]
    pub pipeline_run_id: Option<String>,
    #[serde(default)]
    pub document_path: Option<String>,
    #[serde(default)]
    pub extra: Value,
    pub logged_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            pipeline_id: None,
            pipeline_run_id: None,
            document_path: None,
            extra: Value::Null,
            logged_at: Utc::now(),
        }
    }

    pub fn with_pipeline(mut self, pipeline_id: impl Into<String>) -> Self {
        self.pipeline_id = Some(pipeline_id.into());
        self
    }

    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.pipeline_run_id = Some(run_id.into());
        self
    }

    pub fn with_document(mut self, path: impl Into<String>) -> Self {
        self.document_path = Some(path.into());
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }
}

/// Filters for log queries; results are ordered by `logged_at`.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub level: Option<LogLevel>,
    pub pipeline_id: Option<String>,
    pub pipeline_run_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Port for the persisted operational log.
#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn append(&self, entry: &LogEntry) -> Result<(), EtlError>;

    async fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>, EtlError>;
}

/// Port for persisting processed chunks in the metadata store.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Inserts the chunks under the given run; upsert keyed by chunk id.
    async fn insert_chunks(&self, chunks: &[Chunk], run_id: &str) -> Result<u64, EtlError>;

    /// Number of chunks stored for a run.
    async fn count_for_run(&self, run_id: &str) -> Result<u64, EtlError>;
}
