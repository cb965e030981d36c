// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exporters
//!
//! Implementations of the [`ChunkExporter`] port: SQL engines
//! (SQLite/Postgres/MySQL over one dialect-aware adapter), the document
//! store, and file formats (JSON/CSV/TXT with optional gzip). Exporters
//! are side-effect only - the executor forwards the pre-export chunk list
//! downstream unchanged - and inserts are idempotent via upserts keyed by
//! chunk id.

pub mod document_store;
pub mod file;
pub mod sql;

use text_etl_domain::entities::pipeline::StepKind;
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_exporter::ChunkExporter;

pub use document_store::MongoExporter;
pub use file::{ExportFormat, FileExporter};
pub use sql::SqlExporter;

/// Creates the exporter bound to an exporter step kind.
///
/// `DB_EXPORTER` dispatches on the connection URL scheme: `mongodb://`
/// goes to the document store, everything else to the SQL adapter.
pub fn create_exporter(
    kind: StepKind,
    config: &serde_json::Value,
) -> Result<Box<dyn ChunkExporter>, EtlError> {
    match kind {
        StepKind::DbExporter => {
            let url = config
                .get("db_config")
                .and_then(|c| c.get("url"))
                .and_then(|u| u.as_str())
                .unwrap_or_default();
            if url.starts_with("mongodb://") || url.starts_with("mongodb+srv://") {
                Ok(Box::new(MongoExporter::new()))
            } else {
                Ok(Box::new(SqlExporter::new()))
            }
        }
        StepKind::FileExporter => Ok(Box::new(FileExporter::new())),
        StepKind::JsonExporter => Ok(Box::new(FileExporter::with_format(ExportFormat::Json))),
        other => Err(EtlError::InvalidConfiguration(format!(
            "step kind {} is not an exporter",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_factory_covers_exporter_kinds() {
        assert!(create_exporter(StepKind::FileExporter, &json!({})).is_ok());
        assert!(create_exporter(StepKind::JsonExporter, &json!({})).is_ok());
        assert!(create_exporter(
            StepKind::DbExporter,
            &json!({"db_config": {"url": "sqlite::memory:"}})
        )
        .is_ok());
        assert!(create_exporter(StepKind::LineSplitter, &json!({})).is_err());
    }

    #[test]
    fn test_mongodb_url_selects_document_store() {
        let exporter = create_exporter(
            StepKind::DbExporter,
            &json!({"db_config": {"url": "mongodb://localhost:27017"}}),
        )
        .unwrap();
        assert_eq!(exporter.status().backend, "mongodb");
    }
}
