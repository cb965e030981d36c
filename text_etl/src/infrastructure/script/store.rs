// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encrypted Script Store
//!
//! Persists user scripts encrypted under the process-wide key. Saving
//! requires the static validator to pass; the plaintext SHA-256 is stored
//! next to the ciphertext, and every load recomputes it after decryption
//! and compares in constant time. A mismatch is a tamper error, not a
//! recoverable condition.

use std::sync::Arc;

use serde_json::Value;

use text_etl_domain::entities::script::ScriptRecord;
use text_etl_domain::error::EtlError;
use text_etl_domain::repositories::script_repository::ScriptRepository;
use text_etl_domain::services::checksum::{constant_time_eq, sha256_hex};
use text_etl_domain::value_objects::ids::{PipelineId, ScriptId};

use super::crypto::CryptoService;
use super::sandbox::{ScriptOutcome, ScriptSandbox};
use super::validator::SecurityValidator;

/// A decrypted, integrity-checked script.
#[derive(Debug, Clone)]
pub struct LoadedScript {
    pub record: ScriptRecord,
    pub code: String,
}

/// Encrypted storage facade over the script repository.
pub struct ScriptStore {
    repository: Arc<dyn ScriptRepository>,
    crypto: Arc<CryptoService>,
}

impl ScriptStore {
    pub fn new(repository: Arc<dyn ScriptRepository>, crypto: Arc<CryptoService>) -> Self {
        Self { repository, crypto }
    }

    /// Validates, encrypts, and persists a script.
    ///
    /// # Errors
    ///
    /// `EtlError::SecurityViolation` when static analysis rejects the
    /// source.
    pub async fn save_script(
        &self,
        name: &str,
        code: &str,
        pipeline_id: Option<PipelineId>,
    ) -> Result<ScriptId, EtlError> {
        SecurityValidator::ensure_admissible(code)?;

        let checksum = sha256_hex(code.as_bytes());
        let encrypted = self.crypto.encrypt_str(code)?;
        let record = ScriptRecord::new(name, encrypted, checksum, pipeline_id);
        let id = record.id.clone();
        self.repository.save(&record).await?;
        Ok(id)
    }

    /// Loads and decrypts a script, verifying its checksum.
    ///
    /// # Errors
    ///
    /// `EtlError::IntegrityError` when decryption fails or the recomputed
    /// checksum does not match the stored one.
    pub async fn load_script(&self, id: &ScriptId) -> Result<Option<LoadedScript>, EtlError> {
        let Some(record) = self.repository.find_by_id(id).await? else {
            return Ok(None);
        };

        let code = self.crypto.decrypt_str(&record.encrypted_code)?;
        let recomputed = sha256_hex(code.as_bytes());
        if !constant_time_eq(&recomputed, &record.checksum) {
            return Err(EtlError::IntegrityError(format!(
                "script integrity check failed for {}: checksum mismatch",
                id
            )));
        }

        Ok(Some(LoadedScript { record, code }))
    }

    /// Loads, re-validates, and executes a script in the sandbox.
    ///
    /// A missing script is a hard failure.
    pub async fn validate_and_execute(
        &self,
        id: &ScriptId,
        context: &Value,
        sandbox: &ScriptSandbox,
    ) -> Result<ScriptOutcome, EtlError> {
        let script = self
            .load_script(id)
            .await?
            .ok_or_else(|| EtlError::NotFound(format!("script not found: {}", id)))?;

        // Defense in depth: re-validate before every run
        SecurityValidator::ensure_admissible(&script.code)?;
        sandbox.execute(&script.code, context).await
    }

    pub async fn list_scripts(&self) -> Result<Vec<ScriptRecord>, EtlError> {
        self.repository.list().await
    }

    pub async fn archive_script(&self, id: &ScriptId) -> Result<bool, EtlError> {
        self.repository.archive(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::infrastructure::script::crypto::MasterKey;

    /// In-memory repository for unit tests.
    #[derive(Default)]
    struct MemoryScriptRepository {
        records: Mutex<Vec<ScriptRecord>>,
    }

    #[async_trait]
    impl ScriptRepository for MemoryScriptRepository {
        async fn save(&self, record: &ScriptRecord) -> Result<(), EtlError> {
            self.records.lock().push(record.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &ScriptId) -> Result<Option<ScriptRecord>, EtlError> {
            Ok(self
                .records
                .lock()
                .iter()
                .find(|r| &r.id == id && r.is_active)
                .cloned())
        }

        async fn list(&self) -> Result<Vec<ScriptRecord>, EtlError> {
            Ok(self.records.lock().iter().filter(|r| r.is_active).cloned().collect())
        }

        async fn archive(&self, id: &ScriptId) -> Result<bool, EtlError> {
            let mut records = self.records.lock();
            match records.iter_mut().find(|r| &r.id == id) {
                Some(record) => {
                    record.is_active = false;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    fn store() -> (ScriptStore, Arc<MemoryScriptRepository>) {
        let repository = Arc::new(MemoryScriptRepository::default());
        let crypto = Arc::new(CryptoService::new(&MasterKey::generate().unwrap()));
        (ScriptStore::new(repository.clone(), crypto), repository)
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let (store, _) = store();
        let code = "result = len(values)";
        let id = store.save_script("counter", code, None).await.unwrap();

        let loaded = store.load_script(&id).await.unwrap().unwrap();
        assert_eq!(loaded.code, code);
        assert_eq!(loaded.record.name, "counter");
        // Stored form is encrypted
        assert!(!loaded.record.encrypted_code.contains("len"));
    }

    #[tokio::test]
    async fn test_save_rejects_denied_source() {
        let (store, repository) = store();
        let err = store
            .save_script("bad", "import os\nresult = 1", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "security_violation");
        assert!(repository.records.lock().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_record_fails_integrity() {
        let (store, repository) = store();
        let id = store.save_script("ok", "result = 1", None).await.unwrap();

        {
            let mut records = repository.records.lock();
            records[0].checksum = sha256_hex(b"something else");
        }
        let err = store.load_script(&id).await.unwrap_err();
        assert_eq!(err.kind(), "integrity_error");
    }

    #[tokio::test]
    async fn test_missing_script_is_none_on_load_and_hard_failure_on_execute() {
        let (store, _) = store();
        let missing = ScriptId::new();
        assert!(store.load_script(&missing).await.unwrap().is_none());

        let sandbox = ScriptSandbox::new();
        let err = store
            .validate_and_execute(&missing, &serde_json::json!({}), &sandbox)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_archive_hides_script() {
        let (store, _) = store();
        let id = store.save_script("gone", "result = 2", None).await.unwrap();
        assert!(store.archive_script(&id).await.unwrap());
        assert!(store.load_script(&id).await.unwrap().is_none());
    }
}
