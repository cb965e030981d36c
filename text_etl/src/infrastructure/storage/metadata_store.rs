// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Metadata Store
//!
//! Implements the domain repository ports over one embedded SQLite
//! database. Mutating statements take the store-wide write mutex; reads go
//! straight to the pool. Soft delete flows through `is_active`, and every
//! mutation of pipelines and scripts leaves a changelog row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use text_etl_domain::entities::chunk::Chunk;
use text_etl_domain::entities::pipeline::PipelineConfig;
use text_etl_domain::entities::pipeline_run::{PipelineRun, RunStatus};
use text_etl_domain::entities::script::ScriptRecord;
use text_etl_domain::error::EtlError;
use text_etl_domain::repositories::log_repository::{
    ChunkRepository, LogEntry, LogLevel, LogQuery, LogRepository,
};
use text_etl_domain::repositories::pipeline_repository::{PipelineRepository, RunRepository};
use text_etl_domain::repositories::script_repository::ScriptRepository;
use text_etl_domain::value_objects::ids::{PipelineId, RunId, ScriptId};

use super::schema;

fn db_err(context: &str, err: sqlx::Error) -> EtlError {
    EtlError::DatabaseError(format!("{}: {}", context, err))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, EtlError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| EtlError::SerializationError(format!("timestamp '{}': {}", raw, e)))
}

/// The embedded metadata store.
pub struct SqliteMetadataStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteMetadataStore {
    /// Opens (creating if missing) the store at the given path.
    pub async fn open(db_path: &str) -> Result<Self, EtlError> {
        let url = if db_path.starts_with("sqlite:") {
            db_path.to_string()
        } else {
            format!("sqlite://{}", db_path)
        };
        let pool = schema::initialize_database(&url)
            .await
            .map_err(|e| db_err("open metadata store", e))?;
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> Result<Self, EtlError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| db_err("open in-memory store", e))?;
        schema::ensure_schema(&pool)
            .await
            .map_err(|e| db_err("apply schema", e))?;
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn record_change(
        &self,
        table: &str,
        record_id: &str,
        action: &str,
        old_values: Option<&Value>,
        new_values: Option<&Value>,
    ) -> Result<(), EtlError> {
        sqlx::query(
            "INSERT INTO changelog (table_name, record_id, action, old_values_json, new_values_json, changed_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(table)
        .bind(record_id)
        .bind(action)
        .bind(old_values.map(|v| v.to_string()))
        .bind(new_values.map(|v| v.to_string()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("record changelog", e))?;
        Ok(())
    }

    /// Stores a named target-connection configuration.
    pub async fn save_db_connection(
        &self,
        name: &str,
        connection_type: &str,
        config: &Value,
    ) -> Result<String, EtlError> {
        let _guard = self.write_lock.lock().await;
        let id = format!("conn_{}", ulid::Ulid::new().to_string().to_lowercase());
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO db_connections (id, name, type, config_json, created_at, updated_at, is_active)
             VALUES (?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(name)
        .bind(connection_type)
        .bind(config.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("save db connection", e))?;
        Ok(id)
    }

    /// Lists active target connections as `(id, name, type, config)`.
    pub async fn list_db_connections(
        &self,
    ) -> Result<Vec<(String, String, String, Value)>, EtlError> {
        let rows = sqlx::query(
            "SELECT id, name, type, config_json FROM db_connections WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("list db connections", e))?;
        rows.iter()
            .map(|row| {
                let config_json: String = row.get("config_json");
                Ok((
                    row.get("id"),
                    row.get("name"),
                    row.get("type"),
                    serde_json::from_str(&config_json)?,
                ))
            })
            .collect()
    }

    fn row_to_config(row: &sqlx::sqlite::SqliteRow) -> Result<PipelineConfig, EtlError> {
        let config_json: String = row.get("config_json");
        Ok(serde_json::from_str(&config_json)?)
    }

    fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<PipelineRun, EtlError> {
        let id: String = row.get("id");
        let pipeline_id: String = row.get("pipeline_id");
        let start_time: String = row.get("start_time");
        let end_time: Option<String> = row.get("end_time");
        let status: String = row.get("status");
        let document_paths_json: Option<String> = row.get("document_paths_json");
        let errors_json: Option<String> = row.get("errors_json");
        let metadata_json: Option<String> = row.get("metadata_json");

        let status: RunStatus = serde_json::from_value(Value::String(status))?;
        Ok(PipelineRun {
            id: RunId::parse(id)?,
            pipeline_id: PipelineId::parse(pipeline_id)?,
            start_time: parse_time(&start_time)?,
            end_time: end_time.as_deref().map(parse_time).transpose()?,
            status,
            document_paths: document_paths_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or_default(),
            processed_count: row.get::<i64, _>("processed_count") as u64,
            success_count: row.get::<i64, _>("success_count") as u64,
            error_count: row.get::<i64, _>("error_count") as u64,
            errors: errors_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or_default(),
            metadata: metadata_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or(Value::Null),
        })
    }

    fn row_to_script(row: &sqlx::sqlite::SqliteRow) -> Result<ScriptRecord, EtlError> {
        let id: String = row.get("id");
        let pipeline_id: Option<String> = row.get("pipeline_id");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        Ok(ScriptRecord {
            id: ScriptId::parse(id)?,
            name: row.get("name"),
            encrypted_code: row.get("code_encrypted"),
            checksum: row.get("checksum"),
            pipeline_id: pipeline_id.map(PipelineId::parse).transpose()?,
            version: row.get::<i64, _>("version") as u32,
            is_active: row.get("is_active"),
            created_at: parse_time(&created_at)?,
            updated_at: parse_time(&updated_at)?,
        })
    }
}

#[async_trait]
impl PipelineRepository for SqliteMetadataStore {
    async fn save(&self, config: &PipelineConfig) -> Result<(), EtlError> {
        let _guard = self.write_lock.lock().await;
        let config_json = serde_json::to_value(config)?;
        sqlx::query(
            "INSERT INTO pipelines
             (id, name, description, config_json, schedule, source_config, target_config,
              created_at, updated_at, version, is_active)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(config.id.as_str())
        .bind(&config.name)
        .bind(&config.description)
        .bind(config_json.to_string())
        .bind(&config.schedule)
        .bind(config.source_config.to_string())
        .bind(config.target_config.to_string())
        .bind(config.created_at.to_rfc3339())
        .bind(config.updated_at.to_rfc3339())
        .bind(config.version as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("save pipeline", e))?;

        self.record_change("pipelines", config.id.as_str(), "insert", None, Some(&config_json))
            .await
    }

    async fn update(&self, config: &PipelineConfig) -> Result<bool, EtlError> {
        let _guard = self.write_lock.lock().await;
        let config_json = serde_json::to_value(config)?;
        let result = sqlx::query(
            "UPDATE pipelines
             SET name = ?, description = ?, config_json = ?, schedule = ?,
                 source_config = ?, target_config = ?, updated_at = ?, version = ?
             WHERE id = ? AND is_active = 1",
        )
        .bind(&config.name)
        .bind(&config.description)
        .bind(config_json.to_string())
        .bind(&config.schedule)
        .bind(config.source_config.to_string())
        .bind(config.target_config.to_string())
        .bind(config.updated_at.to_rfc3339())
        .bind(config.version as i64)
        .bind(config.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update pipeline", e))?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.record_change("pipelines", config.id.as_str(), "update", None, Some(&config_json))
                .await?;
        }
        Ok(updated)
    }

    async fn find_by_id(&self, id: &PipelineId) -> Result<Option<PipelineConfig>, EtlError> {
        let row = sqlx::query("SELECT config_json FROM pipelines WHERE id = ? AND is_active = 1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find pipeline", e))?;
        row.as_ref().map(Self::row_to_config).transpose()
    }

    async fn list(&self, active_only: bool) -> Result<Vec<PipelineConfig>, EtlError> {
        let query = if active_only {
            "SELECT config_json FROM pipelines WHERE is_active = 1 ORDER BY created_at"
        } else {
            "SELECT config_json FROM pipelines ORDER BY created_at"
        };
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list pipelines", e))?;
        rows.iter().map(Self::row_to_config).collect()
    }

    async fn archive(&self, id: &PipelineId) -> Result<bool, EtlError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("UPDATE pipelines SET is_active = 0, updated_at = ? WHERE id = ? AND is_active = 1")
            .bind(Utc::now().to_rfc3339())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("archive pipeline", e))?;

        let archived = result.rows_affected() > 0;
        if archived {
            self.record_change("pipelines", id.as_str(), "archive", None, None).await?;
        }
        Ok(archived)
    }
}

#[async_trait]
impl RunRepository for SqliteMetadataStore {
    async fn save(&self, run: &PipelineRun) -> Result<(), EtlError> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT OR REPLACE INTO pipeline_runs
             (id, pipeline_id, start_time, end_time, status, document_paths_json,
              processed_count, success_count, error_count, errors_json, metadata_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(run.id.as_str())
        .bind(run.pipeline_id.as_str())
        .bind(run.start_time.to_rfc3339())
        .bind(run.end_time.map(|t| t.to_rfc3339()))
        .bind(run.status.to_string())
        .bind(serde_json::to_string(&run.document_paths)?)
        .bind(run.processed_count as i64)
        .bind(run.success_count as i64)
        .bind(run.error_count as i64)
        .bind(serde_json::to_string(&run.errors)?)
        .bind(serde_json::to_string(&run.metadata)?)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("save run", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &RunId) -> Result<Option<PipelineRun>, EtlError> {
        let row = sqlx::query("SELECT * FROM pipeline_runs WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find run", e))?;
        row.as_ref().map(Self::row_to_run).transpose()
    }

    async fn list_for_pipeline(
        &self,
        pipeline_id: &PipelineId,
        limit: usize,
    ) -> Result<Vec<PipelineRun>, EtlError> {
        let rows = sqlx::query(
            "SELECT * FROM pipeline_runs WHERE pipeline_id = ? ORDER BY start_time DESC LIMIT ?",
        )
        .bind(pipeline_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("list runs", e))?;
        rows.iter().map(Self::row_to_run).collect()
    }

    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<PipelineRun>, EtlError> {
        let rows = sqlx::query("SELECT * FROM pipeline_runs WHERE status = ? ORDER BY start_time")
            .bind(status.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list runs by status", e))?;
        rows.iter().map(Self::row_to_run).collect()
    }
}

#[async_trait]
impl ScriptRepository for SqliteMetadataStore {
    async fn save(&self, record: &ScriptRecord) -> Result<(), EtlError> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT INTO user_scripts
             (id, name, code_encrypted, checksum, pipeline_id, version, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.as_str())
        .bind(&record.name)
        .bind(&record.encrypted_code)
        .bind(&record.checksum)
        .bind(record.pipeline_id.as_ref().map(|p| p.as_str().to_string()))
        .bind(record.version as i64)
        .bind(record.is_active)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("save script", e))?;

        self.record_change("user_scripts", record.id.as_str(), "insert", None, None)
            .await
    }

    async fn find_by_id(&self, id: &ScriptId) -> Result<Option<ScriptRecord>, EtlError> {
        let row = sqlx::query("SELECT * FROM user_scripts WHERE id = ? AND is_active = 1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find script", e))?;
        row.as_ref().map(Self::row_to_script).transpose()
    }

    async fn list(&self) -> Result<Vec<ScriptRecord>, EtlError> {
        let rows = sqlx::query("SELECT * FROM user_scripts WHERE is_active = 1 ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list scripts", e))?;
        rows.iter().map(Self::row_to_script).collect()
    }

    async fn archive(&self, id: &ScriptId) -> Result<bool, EtlError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("UPDATE user_scripts SET is_active = 0, updated_at = ? WHERE id = ? AND is_active = 1")
            .bind(Utc::now().to_rfc3339())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("archive script", e))?;

        let archived = result.rows_affected() > 0;
        if archived {
            self.record_change("user_scripts", id.as_str(), "archive", None, None).await?;
        }
        Ok(archived)
    }
}

#[async_trait]
impl LogRepository for SqliteMetadataStore {
    async fn append(&self, entry: &LogEntry) -> Result<(), EtlError> {
        let _guard = self.write_lock.lock().await;
        sqlx::query(
            "INSERT INTO logs (level, message, pipeline_id, pipeline_run_id, document_path, extra_data_json, logged_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.level.to_string())
        .bind(&entry.message)
        .bind(&entry.pipeline_id)
        .bind(&entry.pipeline_run_id)
        .bind(&entry.document_path)
        .bind(serde_json::to_string(&entry.extra)?)
        .bind(entry.logged_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("append log", e))?;
        Ok(())
    }

    async fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>, EtlError> {
        // Readers sort by logged_at; filters are optional
        let mut sql = String::from("SELECT * FROM logs WHERE 1 = 1");
        if query.level.is_some() {
            sql.push_str(" AND level = ?");
        }
        if query.pipeline_id.is_some() {
            sql.push_str(" AND pipeline_id = ?");
        }
        if query.pipeline_run_id.is_some() {
            sql.push_str(" AND pipeline_run_id = ?");
        }
        if query.since.is_some() {
            sql.push_str(" AND logged_at >= ?");
        }
        sql.push_str(" ORDER BY logged_at");
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut prepared = sqlx::query(&sql);
        if let Some(level) = query.level {
            prepared = prepared.bind(level.to_string());
        }
        if let Some(pipeline_id) = &query.pipeline_id {
            prepared = prepared.bind(pipeline_id);
        }
        if let Some(run_id) = &query.pipeline_run_id {
            prepared = prepared.bind(run_id);
        }
        if let Some(since) = query.since {
            prepared = prepared.bind(since.to_rfc3339());
        }
        if let Some(limit) = query.limit {
            prepared = prepared.bind(limit as i64);
        }

        let rows = prepared
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("query logs", e))?;

        rows.iter()
            .map(|row| {
                let level: String = row.get("level");
                let logged_at: String = row.get("logged_at");
                let extra: Option<String> = row.get("extra_data_json");
                Ok(LogEntry {
                    level: level.parse::<LogLevel>()?,
                    message: row.get("message"),
                    pipeline_id: row.get("pipeline_id"),
                    pipeline_run_id: row.get("pipeline_run_id"),
                    document_path: row.get("document_path"),
                    extra: extra
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()?
                        .unwrap_or(Value::Null),
                    logged_at: parse_time(&logged_at)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChunkRepository for SqliteMetadataStore {
    async fn insert_chunks(&self, chunks: &[Chunk], run_id: &str) -> Result<u64, EtlError> {
        let _guard = self.write_lock.lock().await;
        let mut inserted = 0u64;
        for chunk in chunks {
            sqlx::query(
                "INSERT OR REPLACE INTO chunks
                 (id, pipeline_run_id, document_id, page_num, section_id, section_title,
                  section_level, text_content, chunk_type, extraction_results_json, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(chunk.id())
            .bind(run_id)
            .bind(chunk.meta().document_id())
            .bind(chunk.meta().page_num().map(|n| n as i64))
            .bind(chunk.meta().section_id())
            .bind(chunk.meta().section_title())
            .bind(chunk.meta().section_level() as i64)
            .bind(chunk.text())
            .bind(chunk.meta().chunk_type().to_string())
            .bind(serde_json::to_string(chunk.extraction_results())?)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("insert chunk", e))?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn count_for_run(&self, run_id: &str) -> Result<u64, EtlError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks WHERE pipeline_run_id = ?")
            .bind(run_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_err("count chunks", e))?;
        Ok(row.0 as u64)
    }
}
