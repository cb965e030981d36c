// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document Store Exporter
//!
//! MongoDB sink using unordered bulk inserts. Duplicate-key failures fall
//! through to per-document inserts that tolerate already-present ids, so
//! repeated exports of the same chunk list converge to the same state.

use async_trait::async_trait;
use bson::{doc, Document as BsonDocument};
use chrono::{DateTime, Utc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::InsertManyOptions;
use mongodb::{Client, Database};
use serde::Deserialize;
use serde_json::Value;

use text_etl_domain::entities::chunk::Chunk;
use text_etl_domain::entities::pipeline_run::PipelineRun;
use text_etl_domain::error::EtlError;
use text_etl_domain::services::chunk_exporter::{ChunkExporter, ExporterStatus};

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Deserialize)]
struct MongoExporterConfig {
    url: String,
    #[serde(default = "default_database")]
    database: String,
}

fn default_database() -> String {
    "text_etl".to_string()
}

/// MongoDB-backed chunk sink.
pub struct MongoExporter {
    client: Option<Client>,
    database: Option<Database>,
    url: Option<String>,
    connected_at: Option<DateTime<Utc>>,
}

impl MongoExporter {
    pub fn new() -> Self {
        Self {
            client: None,
            database: None,
            url: None,
            connected_at: None,
        }
    }

    fn database(&self) -> Result<&Database, EtlError> {
        self.database
            .as_ref()
            .ok_or_else(|| EtlError::DatabaseError("document store is not connected".to_string()))
    }

    fn chunk_document(chunk: &Chunk) -> Result<BsonDocument, EtlError> {
        let extraction = bson::to_bson(&Value::Object(chunk.extraction_results().clone()))
            .map_err(|e| EtlError::SerializationError(format!("extraction results: {}", e)))?;
        Ok(doc! {
            "_id": chunk.id(),
            "text_content": chunk.text(),
            "document_id": chunk.meta().document_id(),
            "page_num": chunk.meta().page_num().map(|n| n as i64),
            "section_id": chunk.meta().section_id(),
            "section_title": chunk.meta().section_title(),
            "section_level": chunk.meta().section_level() as i64,
            "chunk_type": chunk.meta().chunk_type().to_string(),
            "pipeline_run_id": chunk.meta().pipeline_run_id(),
            "source_type": chunk.meta().source_type(),
            "line_num": chunk.meta().line_num().map(|n| n as i64),
            "extraction_results": extraction,
            "created_at": Utc::now().to_rfc3339(),
        })
    }

    fn is_duplicate_key(error: &MongoError) -> bool {
        match &*error.kind {
            ErrorKind::BulkWrite(failure) => failure
                .write_errors
                .as_ref()
                .map(|errors| errors.iter().all(|e| e.code == DUPLICATE_KEY_CODE))
                .unwrap_or(false),
            ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
                write_error.code == DUPLICATE_KEY_CODE
            }
            _ => false,
        }
    }
}

impl Default for MongoExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkExporter for MongoExporter {
    async fn connect(&mut self, config: &Value) -> Result<(), EtlError> {
        let parsed: MongoExporterConfig = serde_json::from_value(config.clone())
            .map_err(|e| EtlError::InvalidConfiguration(format!("document store config: {}", e)))?;

        let client = Client::with_uri_str(&parsed.url)
            .await
            .map_err(|e| EtlError::DatabaseError(format!("connect {}: {}", parsed.url, e)))?;
        self.database = Some(client.database(&parsed.database));
        self.client = Some(client);
        self.url = Some(parsed.url);
        self.connected_at = Some(Utc::now());
        Ok(())
    }

    async fn batch_insert(&self, chunks: &[Chunk], destination: &str) -> Result<(), EtlError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let collection = self.database()?.collection::<BsonDocument>(destination);

        let documents: Vec<BsonDocument> = chunks
            .iter()
            .map(Self::chunk_document)
            .collect::<Result<_, _>>()?;

        let options = InsertManyOptions::builder().ordered(false).build();
        match collection.insert_many(documents.clone(), options).await {
            Ok(_) => Ok(()),
            Err(error) if Self::is_duplicate_key(&error) => {
                // Fall through to per-document inserts, skipping duplicates
                for document in documents {
                    match collection.insert_one(document, None).await {
                        Ok(_) => {}
                        Err(error) if Self::is_duplicate_key(&error) => {}
                        Err(error) => {
                            return Err(EtlError::DatabaseError(format!(
                                "insert into {}: {}",
                                destination, error
                            )))
                        }
                    }
                }
                Ok(())
            }
            Err(error) => Err(EtlError::DatabaseError(format!(
                "bulk insert into {}: {}",
                destination, error
            ))),
        }
    }

    async fn export_run_metadata(&self, run: &PipelineRun) -> Result<(), EtlError> {
        let collection = self.database()?.collection::<BsonDocument>("pipeline_runs");
        let errors = bson::to_bson(&run.errors)
            .map_err(|e| EtlError::SerializationError(format!("run errors: {}", e)))?;
        let metadata = bson::to_bson(&run.metadata)
            .map_err(|e| EtlError::SerializationError(format!("run metadata: {}", e)))?;

        let document = doc! {
            "_id": run.id.as_str(),
            "pipeline_id": run.pipeline_id.as_str(),
            "start_time": run.start_time.to_rfc3339(),
            "end_time": run.end_time.map(|t| t.to_rfc3339()),
            "status": run.status.to_string(),
            "processed_count": run.processed_count as i64,
            "success_count": run.success_count as i64,
            "error_count": run.error_count as i64,
            "errors": errors,
            "metadata": metadata,
            "exported_at": Utc::now().to_rfc3339(),
        };

        match collection.insert_one(document, None).await {
            Ok(_) => Ok(()),
            Err(error) if Self::is_duplicate_key(&error) => Ok(()),
            Err(error) => Err(EtlError::DatabaseError(format!(
                "insert run metadata: {}",
                error
            ))),
        }
    }

    async fn close(&mut self) -> Result<(), EtlError> {
        self.database = None;
        self.client = None;
        self.connected_at = None;
        Ok(())
    }

    fn status(&self) -> ExporterStatus {
        ExporterStatus {
            backend: "mongodb".to_string(),
            connected: self.client.is_some(),
            destination: self.url.clone(),
            connected_at: self.connected_at,
        }
    }
}
