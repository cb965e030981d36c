// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite schema helpers shared by the metadata store.
//!
//! The schema is applied with idempotent `CREATE TABLE IF NOT EXISTS`
//! statements on start-up so integration tests and services see a
//! consistent database.

use sqlx::migrate::MigrateDatabase;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Table and index DDL, applied in order.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS pipelines (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        config_json TEXT NOT NULL,
        schedule TEXT,
        source_config TEXT,
        target_config TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        version INTEGER DEFAULT 1,
        is_active BOOLEAN DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS user_scripts (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        code_encrypted TEXT NOT NULL,
        checksum TEXT NOT NULL,
        pipeline_id TEXT,
        version INTEGER DEFAULT 1,
        is_active BOOLEAN DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (pipeline_id) REFERENCES pipelines (id)
    )",
    "CREATE TABLE IF NOT EXISTS pipeline_runs (
        id TEXT PRIMARY KEY,
        pipeline_id TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT,
        status TEXT NOT NULL,
        document_paths_json TEXT,
        processed_count INTEGER DEFAULT 0,
        success_count INTEGER DEFAULT 0,
        error_count INTEGER DEFAULT 0,
        errors_json TEXT,
        metadata_json TEXT,
        FOREIGN KEY (pipeline_id) REFERENCES pipelines (id)
    )",
    "CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        pipeline_run_id TEXT NOT NULL,
        document_id TEXT,
        page_num INTEGER,
        section_id TEXT,
        section_title TEXT,
        section_level INTEGER,
        text_content TEXT,
        chunk_type TEXT,
        extraction_results_json TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (pipeline_run_id) REFERENCES pipeline_runs (id)
    )",
    "CREATE TABLE IF NOT EXISTS db_connections (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        type TEXT NOT NULL,
        config_json TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        is_active BOOLEAN DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS changelog (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        table_name TEXT NOT NULL,
        record_id TEXT NOT NULL,
        action TEXT NOT NULL,
        old_values_json TEXT,
        new_values_json TEXT,
        changed_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        level TEXT NOT NULL,
        message TEXT NOT NULL,
        pipeline_id TEXT,
        pipeline_run_id TEXT,
        document_path TEXT,
        extra_data_json TEXT,
        logged_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_pipelines_name ON pipelines(name)",
    "CREATE INDEX IF NOT EXISTS idx_pipeline_runs_status ON pipeline_runs(status)",
    "CREATE INDEX IF NOT EXISTS idx_pipeline_runs_time ON pipeline_runs(pipeline_id, start_time)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_run_id ON chunks(pipeline_run_id)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_scripts_pipeline ON user_scripts(pipeline_id)",
    "CREATE INDEX IF NOT EXISTS idx_logs_run ON logs(pipeline_run_id)",
    "CREATE INDEX IF NOT EXISTS idx_logs_time ON logs(logged_at)",
];

/// Applies the schema to the provided SQLite pool.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    debug!("Ensuring database schema is up to date");
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema is up to date");
    Ok(())
}

/// Creates a new SQLite database file if it doesn't exist.
///
/// `SqlitePool::connect` fails on a missing file unless connect options
/// request creation, so callers go through this first.
pub async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    if !sqlx::Sqlite::database_exists(database_url).await? {
        debug!("Database does not exist, creating: {}", database_url);
        sqlx::Sqlite::create_database(database_url).await?;
        info!("Created new SQLite database: {}", database_url);
    } else {
        debug!("Database already exists: {}", database_url);
    }
    Ok(())
}

/// Creates the database when missing, connects, and applies the schema.
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    create_database_if_missing(database_url).await?;
    let pool = SqlitePool::connect(database_url).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}
