// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQL Exporter
//!
//! One dialect-aware exporter over SQLite, Postgres, and MySQL via
//! `sqlx::AnyPool`. The target schema is auto-created on first use
//! (idempotent `CREATE TABLE IF NOT EXISTS`), batch inserts reuse a single
//! prepared statement with an upsert clause keyed by chunk id, and the
//! batch size is configurable (default 1000).

use std::sync::Once;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use text_etl_domain::entities::chunk::Chunk;
use text_etl_domain::entities::pipeline_run::PipelineRun;
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_exporter::{ChunkExporter, ExporterStatus};

/// Default number of rows per insert batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

static INSTALL_DRIVERS: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Sqlite,
    Postgres,
    MySql,
}

impl Dialect {
    fn from_url(url: &str) -> Result<Self, EtlError> {
        if url.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Dialect::Postgres)
        } else if url.starts_with("mysql://") {
            Ok(Dialect::MySql)
        } else {
            Err(EtlError::InvalidConfiguration(format!(
                "unsupported database url: {}",
                url
            )))
        }
    }

    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            _ => "?".to_string(),
        }
    }

    /// MySQL needs a sized key column; TEXT keys are fine elsewhere.
    fn id_column(self) -> &'static str {
        match self {
            Dialect::MySql => "VARCHAR(255) PRIMARY KEY",
            _ => "TEXT PRIMARY KEY",
        }
    }

    fn upsert_clause(self, columns: &[&str]) -> String {
        let updates: Vec<String> = match self {
            Dialect::MySql => columns
                .iter()
                .skip(1)
                .map(|c| format!("{c} = VALUES({c})", c = c))
                .collect(),
            _ => columns
                .iter()
                .skip(1)
                .map(|c| format!("{c} = excluded.{c}", c = c))
                .collect(),
        };
        match self {
            Dialect::MySql => format!("ON DUPLICATE KEY UPDATE {}", updates.join(", ")),
            _ => format!("ON CONFLICT(id) DO UPDATE SET {}", updates.join(", ")),
        }
    }
}

const CHUNK_COLUMNS: &[&str] = &[
    "id",
    "text_content",
    "document_id",
    "page_num",
    "section_id",
    "section_title",
    "section_level",
    "chunk_type",
    "pipeline_run_id",
    "source_type",
    "line_num",
    "extraction_results",
    "created_at",
];

const RUN_COLUMNS: &[&str] = &[
    "id",
    "pipeline_id",
    "start_time",
    "end_time",
    "status",
    "processed_count",
    "success_count",
    "error_count",
    "errors",
    "metadata",
    "exported_at",
];

#[derive(Debug, Deserialize)]
struct SqlExporterConfig {
    url: String,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Dialect-aware SQL sink.
pub struct SqlExporter {
    pool: Option<AnyPool>,
    dialect: Option<Dialect>,
    url: Option<String>,
    batch_size: usize,
    connected_at: Option<DateTime<Utc>>,
}

impl SqlExporter {
    pub fn new() -> Self {
        Self {
            pool: None,
            dialect: None,
            url: None,
            batch_size: DEFAULT_BATCH_SIZE,
            connected_at: None,
        }
    }

    fn pool(&self) -> Result<(&AnyPool, Dialect), EtlError> {
        match (&self.pool, self.dialect) {
            (Some(pool), Some(dialect)) => Ok((pool, dialect)),
            _ => Err(EtlError::DatabaseError(
                "sql exporter is not connected".to_string(),
            )),
        }
    }

    fn valid_identifier(name: &str) -> Result<&str, EtlError> {
        if !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !name.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true)
        {
            Ok(name)
        } else {
            Err(EtlError::InvalidConfiguration(format!(
                "invalid table name: {}",
                name
            )))
        }
    }

    async fn ensure_chunk_table(
        pool: &AnyPool,
        dialect: Dialect,
        table: &str,
    ) -> Result<(), EtlError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id {id_col},
                text_content TEXT,
                document_id TEXT,
                page_num INTEGER,
                section_id TEXT,
                section_title TEXT,
                section_level INTEGER,
                chunk_type TEXT,
                pipeline_run_id TEXT,
                source_type TEXT,
                line_num INTEGER,
                extraction_results TEXT,
                created_at TEXT
            )",
            table = table,
            id_col = dialect.id_column(),
        );
        sqlx::query(&ddl)
            .execute(pool)
            .await
            .map_err(|e| EtlError::DatabaseError(format!("create table {}: {}", table, e)))?;
        Ok(())
    }

    async fn ensure_run_table(pool: &AnyPool, dialect: Dialect) -> Result<(), EtlError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS pipeline_runs (
                id {id_col},
                pipeline_id TEXT,
                start_time TEXT,
                end_time TEXT,
                status TEXT,
                processed_count INTEGER,
                success_count INTEGER,
                error_count INTEGER,
                errors TEXT,
                metadata TEXT,
                exported_at TEXT
            )",
            id_col = dialect.id_column(),
        );
        sqlx::query(&ddl)
            .execute(pool)
            .await
            .map_err(|e| EtlError::DatabaseError(format!("create table pipeline_runs: {}", e)))?;
        Ok(())
    }

    fn insert_sql(dialect: Dialect, table: &str, columns: &[&str]) -> String {
        let placeholders: Vec<String> = (1..=columns.len())
            .map(|i| dialect.placeholder(i))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) {}",
            table,
            columns.join(", "),
            placeholders.join(", "),
            dialect.upsert_clause(columns),
        )
    }
}

impl Default for SqlExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkExporter for SqlExporter {
    async fn connect(&mut self, config: &Value) -> Result<(), EtlError> {
        let parsed: SqlExporterConfig = serde_json::from_value(config.clone())
            .map_err(|e| EtlError::InvalidConfiguration(format!("sql exporter config: {}", e)))?;

        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let dialect = Dialect::from_url(&parsed.url)?;
        let pool = AnyPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(&parsed.url)
            .await
            .map_err(|e| EtlError::DatabaseError(format!("connect {}: {}", parsed.url, e)))?;

        self.pool = Some(pool);
        self.dialect = Some(dialect);
        self.url = Some(parsed.url);
        self.batch_size = parsed.batch_size.max(1);
        self.connected_at = Some(Utc::now());
        Ok(())
    }

    async fn batch_insert(&self, chunks: &[Chunk], destination: &str) -> Result<(), EtlError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let (pool, dialect) = self.pool()?;
        let table = Self::valid_identifier(destination)?;
        Self::ensure_chunk_table(pool, dialect, table).await?;

        let sql = Self::insert_sql(dialect, table, CHUNK_COLUMNS);
        for batch in chunks.chunks(self.batch_size) {
            for chunk in batch {
                let extraction = serde_json::to_string(chunk.extraction_results())?;
                sqlx::query(&sql)
                    .bind(chunk.id())
                    .bind(chunk.text())
                    .bind(chunk.meta().document_id())
                    .bind(chunk.meta().page_num().map(|n| n as i64))
                    .bind(chunk.meta().section_id())
                    .bind(chunk.meta().section_title())
                    .bind(chunk.meta().section_level() as i64)
                    .bind(chunk.meta().chunk_type().to_string())
                    .bind(chunk.meta().pipeline_run_id())
                    .bind(chunk.meta().source_type())
                    .bind(chunk.meta().line_num().map(|n| n as i64))
                    .bind(extraction)
                    .bind(Utc::now().to_rfc3339())
                    .execute(pool)
                    .await
                    .map_err(|e| EtlError::DatabaseError(format!("insert into {}: {}", table, e)))?;
            }
        }
        Ok(())
    }

    async fn export_run_metadata(&self, run: &PipelineRun) -> Result<(), EtlError> {
        let (pool, dialect) = self.pool()?;
        Self::ensure_run_table(pool, dialect).await?;

        let sql = Self::insert_sql(dialect, "pipeline_runs", RUN_COLUMNS);
        sqlx::query(&sql)
            .bind(run.id.as_str())
            .bind(run.pipeline_id.as_str())
            .bind(run.start_time.to_rfc3339())
            .bind(run.end_time.map(|t| t.to_rfc3339()))
            .bind(run.status.to_string())
            .bind(run.processed_count as i64)
            .bind(run.success_count as i64)
            .bind(run.error_count as i64)
            .bind(serde_json::to_string(&run.errors)?)
            .bind(serde_json::to_string(&run.metadata)?)
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await
            .map_err(|e| EtlError::DatabaseError(format!("insert run metadata: {}", e)))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), EtlError> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        self.dialect = None;
        self.connected_at = None;
        Ok(())
    }

    fn status(&self) -> ExporterStatus {
        ExporterStatus {
            backend: "sql".to_string(),
            connected: self.pool.is_some(),
            destination: self.url.clone(),
            connected_at: self.connected_at,
        }
    }
}
