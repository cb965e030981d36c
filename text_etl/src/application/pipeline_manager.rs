// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Manager
//!
//! Lifecycle of pipeline configurations (create, update, soft delete) and
//! of their runs. Update and delete are rejected while a run for the
//! pipeline is active; the active-runs map is guarded by a mutex and the
//! manager is its only owner.
//!
//! `execute` validates that every document path exists, synthesizes the
//! aggregate run, registers it as active, fans the documents out through
//! the task dispatcher (or runs them sequentially), finalizes the status
//! from the counters, and deregisters.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use text_etl_bootstrap::shutdown::CancellationToken;
use text_etl_domain::entities::pipeline::{PipelineConfig, StepKind};
use text_etl_domain::entities::pipeline_run::{PipelineRun, RunStatus};
use text_etl_domain::error::EtlError;
use text_etl_domain::repositories::log_repository::{LogEntry, LogLevel, LogRepository};
use text_etl_domain::repositories::pipeline_repository::{PipelineRepository, RunRepository};
use text_etl_domain::value_objects::ids::{PipelineId, RunId, ScriptId};

use super::task_dispatcher::{BatchOutcome, TaskDispatcher};
use crate::infrastructure::script::ScriptStore;

/// How a run's documents are driven through the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
    Adaptive,
    Priority {
        priority_paths: Vec<PathBuf>,
    },
}

/// One active run entry.
struct ActiveRun {
    run_id: RunId,
    cancel: CancellationToken,
}

/// Lifecycle manager for pipeline configurations and runs.
pub struct PipelineManager {
    pipelines: Arc<dyn PipelineRepository>,
    runs: Arc<dyn RunRepository>,
    logs: Arc<dyn LogRepository>,
    scripts: Arc<ScriptStore>,
    dispatcher: Arc<TaskDispatcher>,
    active_runs: Mutex<HashMap<String, ActiveRun>>,
}

impl PipelineManager {
    pub fn new(
        pipelines: Arc<dyn PipelineRepository>,
        runs: Arc<dyn RunRepository>,
        logs: Arc<dyn LogRepository>,
        scripts: Arc<ScriptStore>,
        dispatcher: Arc<TaskDispatcher>,
    ) -> Self {
        Self {
            pipelines,
            runs,
            logs,
            scripts,
            dispatcher,
            active_runs: Mutex::new(HashMap::new()),
        }
    }

    fn is_active(&self, pipeline_id: &PipelineId) -> bool {
        self.active_runs.lock().contains_key(pipeline_id.as_str())
    }

    /// Full validation: structural rules plus referenced-script existence.
    pub async fn validate_pipeline(&self, config: &PipelineConfig) -> Vec<String> {
        let mut errors = config.validation_errors();

        for step in &config.steps {
            if step.kind == StepKind::UserScript {
                if let Some(raw_id) = step.param_str("script_id") {
                    match ScriptId::parse(raw_id) {
                        Ok(script_id) => match self.scripts.load_script(&script_id).await {
                            Ok(Some(_)) => {}
                            Ok(None) => {
                                errors.push(format!("script not found: {}", raw_id));
                            }
                            Err(err) => {
                                errors.push(format!("script {} failed to load: {}", raw_id, err));
                            }
                        },
                        Err(_) => errors.push(format!("invalid script id: {}", raw_id)),
                    }
                }
            }
        }

        errors
    }

    /// Creates a pipeline after full validation.
    pub async fn create_pipeline(&self, config: PipelineConfig) -> Result<PipelineId, EtlError> {
        let errors = self.validate_pipeline(&config).await;
        if !errors.is_empty() {
            return Err(EtlError::InvalidConfiguration(errors.join("; ")));
        }

        self.pipelines.save(&config).await?;
        self.logs
            .append(
                &LogEntry::new(LogLevel::Info, format!("Pipeline created: {}", config.name))
                    .with_pipeline(config.id.as_str()),
            )
            .await?;
        Ok(config.id)
    }

    /// Updates a pipeline; rejected while the pipeline has an active run.
    pub async fn update_pipeline(&self, mut config: PipelineConfig) -> Result<bool, EtlError> {
        if self.is_active(&config.id) {
            return Err(EtlError::InvalidConfiguration(format!(
                "pipeline {} has an active run and cannot be updated",
                config.id
            )));
        }
        let errors = self.validate_pipeline(&config).await;
        if !errors.is_empty() {
            return Err(EtlError::InvalidConfiguration(errors.join("; ")));
        }

        config.touch();
        let updated = self.pipelines.update(&config).await?;
        if updated {
            self.logs
                .append(
                    &LogEntry::new(LogLevel::Info, format!("Pipeline updated: {}", config.name))
                        .with_pipeline(config.id.as_str())
                        .with_extra(json!({"version": config.version})),
                )
                .await?;
        }
        Ok(updated)
    }

    /// Soft-deletes a pipeline; rejected while it has an active run.
    pub async fn delete_pipeline(&self, pipeline_id: &PipelineId) -> Result<bool, EtlError> {
        if self.is_active(pipeline_id) {
            return Err(EtlError::InvalidConfiguration(format!(
                "pipeline {} has an active run and cannot be deleted",
                pipeline_id
            )));
        }
        let archived = self.pipelines.archive(pipeline_id).await?;
        if archived {
            self.logs
                .append(
                    &LogEntry::new(LogLevel::Info, "Pipeline deleted".to_string())
                        .with_pipeline(pipeline_id.as_str()),
                )
                .await?;
        }
        Ok(archived)
    }

    pub async fn get_pipeline(&self, pipeline_id: &PipelineId) -> Result<Option<PipelineConfig>, EtlError> {
        self.pipelines.find_by_id(pipeline_id).await
    }

    pub async fn list_pipelines(&self, active_only: bool) -> Result<Vec<PipelineConfig>, EtlError> {
        self.pipelines.list(active_only).await
    }

    pub async fn run_history(
        &self,
        pipeline_id: &PipelineId,
        limit: usize,
    ) -> Result<Vec<PipelineRun>, EtlError> {
        self.runs.list_for_pipeline(pipeline_id, limit).await
    }

    /// Pipeline ids with an active run.
    pub fn active_pipelines(&self) -> Vec<String> {
        self.active_runs.lock().keys().cloned().collect()
    }

    /// Launches a run over the given documents and waits for completion.
    pub async fn execute(
        &self,
        pipeline_id: &PipelineId,
        document_paths: Vec<PathBuf>,
        run_metadata: Value,
        mode: ExecutionMode,
    ) -> Result<RunId, EtlError> {
        let config = self
            .pipelines
            .find_by_id(pipeline_id)
            .await?
            .ok_or_else(|| EtlError::NotFound(format!("pipeline not found: {}", pipeline_id)))?;

        if document_paths.is_empty() {
            return Err(EtlError::InvalidConfiguration(
                "no document paths provided".to_string(),
            ));
        }
        let missing: Vec<String> = document_paths
            .iter()
            .filter(|p| !p.exists())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(EtlError::IoError(format!(
                "document paths do not exist: {}",
                missing.join(", ")
            )));
        }

        // Register the active run; one run per pipeline at a time
        let mut run = PipelineRun::new(
            pipeline_id.clone(),
            document_paths.iter().map(|p| p.display().to_string()).collect(),
        )
        .with_metadata(run_metadata.clone());
        run.start();
        let cancel = CancellationToken::never();
        {
            let mut active = self.active_runs.lock();
            if active.contains_key(pipeline_id.as_str()) {
                return Err(EtlError::InvalidConfiguration(format!(
                    "pipeline {} already has an active run",
                    pipeline_id
                )));
            }
            active.insert(
                pipeline_id.as_str().to_string(),
                ActiveRun {
                    run_id: run.id.clone(),
                    cancel: cancel.clone(),
                },
            );
        }
        self.runs.save(&run).await?;

        let outcome = match &mode {
            ExecutionMode::Parallel => {
                self.dispatcher
                    .process_parallel(&config, &document_paths, None, &run_metadata, &cancel)
                    .await
            }
            ExecutionMode::Sequential => {
                self.dispatcher
                    .process_sequential(&config, &document_paths, &run_metadata, &cancel)
                    .await
            }
            ExecutionMode::Adaptive => {
                self.dispatcher
                    .process_adaptive(&config, &document_paths, &run_metadata, &cancel)
                    .await
            }
            ExecutionMode::Priority { priority_paths } => {
                let normal: Vec<PathBuf> = document_paths
                    .iter()
                    .filter(|p| !priority_paths.contains(p))
                    .cloned()
                    .collect();
                self.dispatcher
                    .process_priority(&config, priority_paths, &normal, &run_metadata, &cancel)
                    .await
            }
        };

        self.finalize_run(pipeline_id, run, outcome, cancel.is_cancelled()).await
    }

    async fn finalize_run(
        &self,
        pipeline_id: &PipelineId,
        mut run: PipelineRun,
        outcome: BatchOutcome,
        was_cancelled: bool,
    ) -> Result<RunId, EtlError> {
        run.processed_count = outcome.processed_count;
        run.success_count = outcome.success_count;
        for error in &outcome.errors {
            run.errors.push(text_etl_domain::entities::pipeline_run::RunError {
                timestamp: error.timestamp,
                step_id: None,
                stage: Some("dispatch".to_string()),
                kind: error.kind.clone(),
                message: error.message.clone(),
                document_path: Some(error.document_path.clone()),
            });
        }
        run.error_count = outcome.error_count;

        let status = if was_cancelled {
            RunStatus::Cancelled
        } else {
            run.outcome_status()
        };
        run.complete(status);
        self.runs.save(&run).await?;

        // Deregister regardless of outcome
        self.active_runs.lock().remove(pipeline_id.as_str());

        self.logs
            .append(
                &LogEntry::new(
                    if run.error_count == 0 { LogLevel::Info } else { LogLevel::Warning },
                    format!("Pipeline run finished: {}", run.status),
                )
                .with_pipeline(pipeline_id.as_str())
                .with_run(run.id.as_str())
                .with_extra(json!({
                    "processed": run.processed_count,
                    "success": run.success_count,
                    "error": run.error_count,
                    "workers_used": outcome.workers_used,
                })),
            )
            .await?;

        Ok(run.id)
    }

    /// Cancels the pipeline's active run: flips the status to CANCELLED,
    /// sets the end time, and removes the run from the active map.
    /// In-flight steps run to completion and exit at the next boundary.
    pub async fn cancel(&self, pipeline_id: &PipelineId) -> Result<bool, EtlError> {
        let entry = self.active_runs.lock().remove(pipeline_id.as_str());
        let Some(entry) = entry else {
            return Ok(false);
        };
        entry.cancel.cancel();

        if let Some(mut run) = self.runs.find_by_id(&entry.run_id).await? {
            run.complete(RunStatus::Cancelled);
            self.runs.save(&run).await?;
        }
        self.logs
            .append(
                &LogEntry::new(LogLevel::Warning, "Pipeline run cancelled".to_string())
                    .with_pipeline(pipeline_id.as_str())
                    .with_run(entry.run_id.as_str()),
            )
            .await?;
        Ok(true)
    }
}
