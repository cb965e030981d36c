// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Run Entity
//!
//! One execution of a pipeline over a fixed document list. A run is
//! terminal iff `end_time` is set, and its counters always satisfy
//! `success + error <= processed <= |document_paths|`.
//!
//! The persisted `error_count` field is the document-failure counter; the
//! structured `errors` list holds per-step and per-document entries and is
//! serialized separately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EtlError;
use crate::value_objects::ids::{PipelineId, RunId};

/// Execution status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    PartialSuccess,
    Paused,
    Cancelled,
}

impl RunStatus {
    /// Terminal states carry an `end_time`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed
                | RunStatus::Failed
                | RunStatus::PartialSuccess
                | RunStatus::Cancelled
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::PartialSuccess => "partial_success",
            RunStatus::Paused => "paused",
            RunStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// One structured error entry on a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub document_path: Option<String>,
}

/// One pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: RunId,
    pub pipeline_id: PipelineId,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub document_paths: Vec<String>,
    #[serde(default)]
    pub processed_count: u64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub errors: Vec<RunError>,
    #[serde(default)]
    pub metadata: Value,
}

impl PipelineRun {
    pub fn new(pipeline_id: PipelineId, document_paths: Vec<String>) -> Self {
        Self {
            id: RunId::new(),
            pipeline_id,
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Pending,
            document_paths,
            processed_count: 0,
            success_count: 0,
            error_count: 0,
            errors: Vec::new(),
            metadata: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn start(&mut self) {
        self.status = RunStatus::Running;
    }

    /// Appends a structured error and bumps the failure counter.
    pub fn add_error(
        &mut self,
        error: &EtlError,
        step_id: Option<&str>,
        stage: Option<&str>,
        document_path: Option<&str>,
    ) {
        self.error_count += 1;
        self.errors.push(RunError {
            timestamp: Utc::now(),
            step_id: step_id.map(str::to_string),
            stage: stage.map(str::to_string),
            kind: error.kind().to_string(),
            message: error.to_string(),
            document_path: document_path.map(str::to_string),
        });
    }

    /// Appends a structured error without bumping the document-failure
    /// counter (per-step entries of a document that later succeeds).
    pub fn record_step_error(&mut self, error: &EtlError, step_id: &str, stage: &str) {
        self.errors.push(RunError {
            timestamp: Utc::now(),
            step_id: Some(step_id.to_string()),
            stage: Some(stage.to_string()),
            kind: error.kind().to_string(),
            message: error.to_string(),
            document_path: None,
        });
    }

    /// Finalizes the run: stamps `end_time` and sets the terminal status.
    pub fn complete(&mut self, status: RunStatus) {
        self.end_time = Some(Utc::now());
        self.status = status;
    }

    /// Terminal status appropriate for the current counters.
    pub fn outcome_status(&self) -> RunStatus {
        if self.error_count == 0 {
            RunStatus::Completed
        } else if self.success_count > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Failed
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Checks the run invariants: terminal iff ended, and counter ordering.
    pub fn validate(&self) -> Result<(), EtlError> {
        if self.status.is_terminal() != self.end_time.is_some() {
            return Err(EtlError::ValidationError(format!(
                "run {} status {} disagrees with end_time presence",
                self.id, self.status
            )));
        }
        if self.success_count + self.error_count > self.processed_count {
            return Err(EtlError::ValidationError(format!(
                "run {} counters violate success + error <= processed",
                self.id
            )));
        }
        if self.processed_count > self.document_paths.len() as u64 {
            return Err(EtlError::ValidationError(format!(
                "run {} processed more documents than listed",
                self.id
            )));
        }
        Ok(())
    }
}
