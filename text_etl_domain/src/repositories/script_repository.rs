// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for encrypted user scripts.

use async_trait::async_trait;

use crate::entities::script::ScriptRecord;
use crate::error::EtlError;
use crate::value_objects::ids::ScriptId;

#[async_trait]
pub trait ScriptRepository: Send + Sync {
    /// Inserts a new script record.
    async fn save(&self, record: &ScriptRecord) -> Result<(), EtlError>;

    /// Fetches an active script by id.
    async fn find_by_id(&self, id: &ScriptId) -> Result<Option<ScriptRecord>, EtlError>;

    /// Lists active scripts.
    async fn list(&self) -> Result<Vec<ScriptRecord>, EtlError>;

    /// Soft-deletes via `is_active`; returns false when absent.
    async fn archive(&self, id: &ScriptId) -> Result<bool, EtlError>;
}
