// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Dispatcher
//!
//! Parallel execution across documents with a bounded worker pool
//! (`min(CPU, 8)` by default, capped to the document count), per-document
//! timeout (default five minutes), and resource-aware admission: before a
//! document is submitted the resource monitor is sampled, and work is
//! refused while memory exceeds 80% or CPU exceeds 90%, with waiter
//! backoff.
//!
//! Modes:
//! - **parallel** / **sequential**;
//! - **adaptive**: documents run in four equal batches; between batches
//!   the worker count moves by ±1 based on live usage, bounded by the
//!   pool cap, with every adjustment recorded;
//! - **priority**: the priority lane drains fully (up to four workers)
//!   before the normal lane starts with the full pool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use text_etl_bootstrap::shutdown::CancellationToken;
use text_etl_domain::entities::pipeline::PipelineConfig;
use text_etl_domain::error::EtlError;

use super::document_executor::DocumentProcessor;
use super::error_recovery::ErrorRecoveryService;
use super::resource_monitor::ResourceMonitor;
use text_etl_domain::services::recovery_classifier::RecoveryStrategy;

/// Hard cap on the default worker pool.
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// Dispatcher tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Pool cap; defaults to `min(CPU, 8)`.
    pub max_workers: usize,
    /// Admission refuses work above this memory usage.
    pub memory_limit_percent: f32,
    /// Admission refuses work above this CPU usage.
    pub cpu_limit_percent: f32,
    /// Per-document processing deadline.
    pub document_timeout: Duration,
    /// Pause between admission re-checks.
    pub admission_backoff: Duration,
    /// Admission re-checks before giving up on a document.
    pub admission_attempts: usize,
}

impl DispatcherConfig {
    pub fn for_cores(cores: usize) -> Self {
        Self {
            max_workers: cores.clamp(1, MAX_DEFAULT_WORKERS),
            memory_limit_percent: 80.0,
            cpu_limit_percent: 90.0,
            document_timeout: Duration::from_secs(300),
            admission_backoff: Duration::from_millis(500),
            admission_attempts: 20,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::for_cores(
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        )
    }
}

/// One failed document in a batch.
#[derive(Debug, Clone)]
pub struct DispatchError {
    pub document_path: String,
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// One worker-count change in adaptive mode.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerAdjustment {
    pub timestamp: DateTime<Utc>,
    pub action: &'static str,
    pub from: usize,
    pub to: usize,
}

/// Aggregated result of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub processed_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub errors: Vec<DispatchError>,
    pub processing_times: HashMap<String, Duration>,
    pub adjustments: Vec<WorkerAdjustment>,
    pub workers_used: usize,
}

impl BatchOutcome {
    fn merge(&mut self, other: BatchOutcome) {
        self.processed_count += other.processed_count;
        self.success_count += other.success_count;
        self.error_count += other.error_count;
        self.errors.extend(other.errors);
        self.processing_times.extend(other.processing_times);
        self.adjustments.extend(other.adjustments);
        self.workers_used = self.workers_used.max(other.workers_used);
    }
}

/// Bounded-parallelism dispatcher over a [`DocumentProcessor`].
pub struct TaskDispatcher {
    processor: Arc<dyn DocumentProcessor>,
    monitor: Arc<ResourceMonitor>,
    config: DispatcherConfig,
    recovery: Option<Arc<ErrorRecoveryService>>,
}

impl TaskDispatcher {
    pub fn new(
        processor: Arc<dyn DocumentProcessor>,
        monitor: Arc<ResourceMonitor>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            processor,
            monitor,
            config,
            recovery: None,
        }
    }

    /// Routes failed documents through the recovery service. A document
    /// counts as a success when a retry or fallback actually reprocessed
    /// it; skip and rollback leave it in the error column.
    pub fn with_recovery(mut self, recovery: Arc<ErrorRecoveryService>) -> Self {
        self.recovery = Some(recovery);
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Waits until resource usage is below the admission limits.
    ///
    /// # Errors
    ///
    /// `EtlError::ResourceExhausted` when the limits are still exceeded
    /// after the configured number of backoff rounds.
    async fn wait_for_admission(&self) -> Result<(), EtlError> {
        for _ in 0..self.config.admission_attempts {
            let sample = self.monitor.sample_now();
            if sample.memory_percent <= self.config.memory_limit_percent
                && sample.cpu_percent <= self.config.cpu_limit_percent
            {
                return Ok(());
            }
            tokio::time::sleep(self.config.admission_backoff).await;
        }
        Err(EtlError::ResourceExhausted(format!(
            "admission refused: memory > {}% or cpu > {}%",
            self.config.memory_limit_percent, self.config.cpu_limit_percent
        )))
    }

    /// Processes documents in parallel with a bounded worker pool.
    pub async fn process_parallel(
        &self,
        config: &PipelineConfig,
        paths: &[PathBuf],
        workers: Option<usize>,
        run_metadata: &Value,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if paths.is_empty() {
            return outcome;
        }

        let workers = workers
            .unwrap_or(self.config.max_workers)
            .clamp(1, self.config.max_workers)
            .min(paths.len());
        outcome.workers_used = workers;

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set: JoinSet<(String, Duration, Result<(), EtlError>)> = JoinSet::new();

        for path in paths {
            if cancel.is_cancelled() {
                break;
            }
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // Resource-aware admission before submitting work
            if let Err(err) = self.wait_for_admission().await {
                outcome.processed_count += 1;
                outcome.error_count += 1;
                outcome.errors.push(DispatchError {
                    document_path: path.display().to_string(),
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                    timestamp: Utc::now(),
                });
                drop(permit);
                continue;
            }

            let processor = self.processor.clone();
            let recovery = self.recovery.clone();
            let pipeline = config.clone();
            let metadata = run_metadata.clone();
            let token = cancel.clone();
            let timeout = self.config.document_timeout;
            let path = path.clone();

            join_set.spawn(async move {
                let _permit = permit;
                let path_string = path.display().to_string();
                let started = std::time::Instant::now();
                let mut result = match tokio::time::timeout(
                    timeout,
                    processor.process_document(&pipeline, &path, &metadata, &token),
                )
                .await
                {
                    Ok(Ok(_report)) => Ok(()),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(EtlError::InternalError(format!(
                        "document processing timed out after {} seconds",
                        timeout.as_secs()
                    ))),
                };

                // Failed documents are handed to error recovery; a retry
                // or fallback that reprocessed the document clears it.
                result = match (result, recovery) {
                    (Err(err), Some(recovery)) if err.is_recoverable() => {
                        let outcome = recovery
                            .handle_document_failure(&pipeline, &path, &err.to_string(), &token)
                            .await;
                        let reprocessed = outcome.success
                            && matches!(
                                outcome.strategy,
                                Some(RecoveryStrategy::Retry) | Some(RecoveryStrategy::Fallback)
                            );
                        if reprocessed {
                            Ok(())
                        } else {
                            Err(err)
                        }
                    }
                    (other, _) => other,
                };
                (path_string, started.elapsed(), result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((path, elapsed, result)) => {
                    outcome.processed_count += 1;
                    match result {
                        Ok(()) => {
                            outcome.success_count += 1;
                            outcome.processing_times.insert(path, elapsed);
                        }
                        Err(err) if err.is_cancellation() => {
                            // Cooperative exit is not a failure
                        }
                        Err(err) => {
                            outcome.error_count += 1;
                            outcome.errors.push(DispatchError {
                                document_path: path,
                                kind: err.kind().to_string(),
                                message: err.to_string(),
                                timestamp: Utc::now(),
                            });
                        }
                    }
                }
                Err(join_error) => {
                    outcome.processed_count += 1;
                    outcome.error_count += 1;
                    outcome.errors.push(DispatchError {
                        document_path: "<unknown>".to_string(),
                        kind: "unknown".to_string(),
                        message: format!("worker panicked: {}", join_error),
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        outcome
    }

    /// Processes documents one at a time.
    pub async fn process_sequential(
        &self,
        config: &PipelineConfig,
        paths: &[PathBuf],
        run_metadata: &Value,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        self.process_parallel(config, paths, Some(1), run_metadata, cancel)
            .await
    }

    /// Adaptive mode: four equal batches with ±1 worker adjustments
    /// between them, driven by live resource usage.
    pub async fn process_adaptive(
        &self,
        config: &PipelineConfig,
        paths: &[PathBuf],
        run_metadata: &Value,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if paths.is_empty() {
            return outcome;
        }

        let batch_size = (paths.len() / 4).max(1);
        let mut current_workers = 2usize.min(paths.len()).clamp(1, self.config.max_workers);

        for batch in paths.chunks(batch_size) {
            if cancel.is_cancelled() {
                break;
            }

            let usage = self.monitor.sample_now();
            if usage.memory_percent > 70.0 || usage.cpu_percent > 80.0 {
                let reduced = current_workers.saturating_sub(1).max(1);
                if reduced != current_workers {
                    outcome.adjustments.push(WorkerAdjustment {
                        timestamp: Utc::now(),
                        action: "reduce_workers",
                        from: current_workers,
                        to: reduced,
                    });
                    current_workers = reduced;
                }
            } else if usage.memory_percent < 50.0 && usage.cpu_percent < 60.0 {
                let increased = (current_workers + 1).min(self.config.max_workers);
                if increased != current_workers {
                    outcome.adjustments.push(WorkerAdjustment {
                        timestamp: Utc::now(),
                        action: "increase_workers",
                        from: current_workers,
                        to: increased,
                    });
                    current_workers = increased;
                }
            }

            let batch_outcome = self
                .process_parallel(config, batch, Some(current_workers), run_metadata, cancel)
                .await;
            outcome.merge(batch_outcome);
        }

        outcome.workers_used = current_workers;
        outcome
    }

    /// Priority mode: the priority lane drains fully (up to four workers)
    /// before the normal lane starts with the full pool.
    pub async fn process_priority(
        &self,
        config: &PipelineConfig,
        priority_paths: &[PathBuf],
        normal_paths: &[PathBuf],
        run_metadata: &Value,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        if !priority_paths.is_empty() {
            let lane_workers = self.config.max_workers.min(4);
            let priority_outcome = self
                .process_parallel(config, priority_paths, Some(lane_workers), run_metadata, cancel)
                .await;
            outcome.merge(priority_outcome);
        }

        if !normal_paths.is_empty() && !cancel.is_cancelled() {
            let normal_outcome = self
                .process_parallel(config, normal_paths, None, run_metadata, cancel)
                .await;
            outcome.merge(normal_outcome);
        }

        outcome
    }
}
