// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Stored user-script record: encrypted source plus the plaintext SHA-256
//! checksum used for tamper detection on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::ids::{PipelineId, ScriptId};

/// Encrypted script row as persisted in the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub id: ScriptId,
    pub name: String,
    /// Base64 ciphertext (nonce prepended).
    pub encrypted_code: String,
    /// Hex SHA-256 of the plaintext.
    pub checksum: String,
    #[serde(default)]
    pub pipeline_id: Option<PipelineId>,
    pub version: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScriptRecord {
    pub fn new(
        name: impl Into<String>,
        encrypted_code: impl Into<String>,
        checksum: impl Into<String>,
        pipeline_id: Option<PipelineId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ScriptId::new(),
            name: name.into(),
            encrypted_code: encrypted_code.into(),
            checksum: checksum.into(),
            pipeline_id,
            version: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
