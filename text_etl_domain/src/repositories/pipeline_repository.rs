// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline and Run Repository Ports
//!
//! Persistence contracts for pipeline configurations and runs. The
//! implementing store serializes mutating statements behind a mutex; reads
//! are lock-free.

use async_trait::async_trait;

use crate::entities::pipeline::PipelineConfig;
use crate::entities::pipeline_run::{PipelineRun, RunStatus};
use crate::error::EtlError;
use crate::value_objects::ids::{PipelineId, RunId};

/// Persistence port for pipeline configurations with soft delete.
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Persists a new configuration.
    async fn save(&self, config: &PipelineConfig) -> Result<(), EtlError>;

    /// Replaces an existing configuration; returns false when absent.
    async fn update(&self, config: &PipelineConfig) -> Result<bool, EtlError>;

    /// Fetches an active configuration by id.
    async fn find_by_id(&self, id: &PipelineId) -> Result<Option<PipelineConfig>, EtlError>;

    /// Lists configurations, optionally including soft-deleted ones.
    async fn list(&self, active_only: bool) -> Result<Vec<PipelineConfig>, EtlError>;

    /// Soft-deletes via `is_active`; returns false when absent.
    async fn archive(&self, id: &PipelineId) -> Result<bool, EtlError>;
}

/// Persistence port for pipeline runs.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Inserts or replaces the run row.
    async fn save(&self, run: &PipelineRun) -> Result<(), EtlError>;

    async fn find_by_id(&self, id: &RunId) -> Result<Option<PipelineRun>, EtlError>;

    /// Most recent runs for a pipeline, newest first.
    async fn list_for_pipeline(
        &self,
        pipeline_id: &PipelineId,
        limit: usize,
    ) -> Result<Vec<PipelineRun>, EtlError>;

    /// Runs currently in the given status.
    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<PipelineRun>, EtlError>;
}
