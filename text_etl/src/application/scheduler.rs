// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler Service
//!
//! Cron-triggered pipeline launches. Jobs are keyed by pipeline id (one
//! active schedule per pipeline); adding a schedule replaces any existing
//! job. Each job owns a background task that computes the next fire time
//! from the cron expression, sleeps until then, and launches the pipeline
//! through the manager.
//!
//! Events are persisted through the log store: EXECUTED on success, ERROR
//! on a failed launch, MISSED when a tick fires while the scheduler is
//! paused (pause/resume is global). Rescheduling replaces the trigger
//! only; cancelling removes the job. In-flight launches complete.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use ulid::Ulid;

use text_etl_domain::error::EtlError;
use text_etl_domain::repositories::log_repository::{LogEntry, LogLevel, LogRepository};
use text_etl_domain::value_objects::cron_schedule::CronSchedule;
use text_etl_domain::value_objects::ids::PipelineId;

use super::pipeline_manager::{ExecutionMode, PipelineManager};

/// Scheduler event kinds, persisted in the log store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    Executed,
    Error,
    Missed,
}

impl SchedulerEvent {
    fn as_str(self) -> &'static str {
        match self {
            SchedulerEvent::Executed => "EXECUTED",
            SchedulerEvent::Error => "ERROR",
            SchedulerEvent::Missed => "MISSED",
        }
    }
}

/// Everything a job task needs, cloned into the background task.
#[derive(Clone)]
struct JobSpec {
    job_id: String,
    pipeline_id: PipelineId,
    schedule: CronSchedule,
    document_paths: Vec<PathBuf>,
    run_metadata: Value,
}

struct ScheduledJob {
    spec: JobSpec,
    handle: tokio::task::JoinHandle<()>,
}

/// Cron-driven pipeline launcher.
pub struct SchedulerService {
    manager: Arc<PipelineManager>,
    logs: Arc<dyn LogRepository>,
    jobs: Mutex<HashMap<String, ScheduledJob>>,
    paused: Arc<AtomicBool>,
}

impl SchedulerService {
    pub fn new(manager: Arc<PipelineManager>, logs: Arc<dyn LogRepository>) -> Self {
        Self {
            manager,
            logs,
            jobs: Mutex::new(HashMap::new()),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn log_event(
        logs: &Arc<dyn LogRepository>,
        event: SchedulerEvent,
        job_id: &str,
        pipeline_id: &PipelineId,
        detail: Option<String>,
    ) {
        let level = match event {
            SchedulerEvent::Executed => LogLevel::Info,
            _ => LogLevel::Error,
        };
        let entry = LogEntry::new(level, format!("Scheduler event: {}", event.as_str()))
            .with_pipeline(pipeline_id.as_str())
            .with_extra(json!({
                "event_type": event.as_str(),
                "job_id": job_id,
                "detail": detail,
            }));
        if let Err(err) = logs.append(&entry).await {
            tracing::warn!("failed to persist scheduler event: {}", err);
        }
    }

    fn spawn_job(&self, spec: JobSpec) -> tokio::task::JoinHandle<()> {
        let manager = self.manager.clone();
        let logs = self.logs.clone();
        let paused = self.paused.clone();

        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = spec.schedule.next_after(&now) else {
                    tracing::warn!(
                        job = %spec.job_id,
                        "schedule has no future firing; job exits"
                    );
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                if paused.load(Ordering::SeqCst) {
                    Self::log_event(
                        &logs,
                        SchedulerEvent::Missed,
                        &spec.job_id,
                        &spec.pipeline_id,
                        Some("scheduler paused".to_string()),
                    )
                    .await;
                    continue;
                }

                match manager
                    .execute(
                        &spec.pipeline_id,
                        spec.document_paths.clone(),
                        spec.run_metadata.clone(),
                        ExecutionMode::Parallel,
                    )
                    .await
                {
                    Ok(run_id) => {
                        Self::log_event(
                            &logs,
                            SchedulerEvent::Executed,
                            &spec.job_id,
                            &spec.pipeline_id,
                            Some(run_id.to_string()),
                        )
                        .await;
                    }
                    Err(err) => {
                        Self::log_event(
                            &logs,
                            SchedulerEvent::Error,
                            &spec.job_id,
                            &spec.pipeline_id,
                            Some(err.to_string()),
                        )
                        .await;
                    }
                }
            }
        })
    }

    /// Schedules a pipeline; any existing job for the pipeline is
    /// replaced. Returns the job id.
    pub async fn schedule_pipeline(
        &self,
        pipeline_id: &PipelineId,
        cron_expression: &str,
        document_paths: Vec<PathBuf>,
        run_metadata: Value,
    ) -> Result<String, EtlError> {
        let schedule = CronSchedule::parse(cron_expression)?;

        self.manager
            .get_pipeline(pipeline_id)
            .await?
            .ok_or_else(|| EtlError::NotFound(format!("pipeline not found: {}", pipeline_id)))?;

        let job_id = format!(
            "job_{}_{}",
            pipeline_id.as_str(),
            Ulid::new().to_string().to_lowercase()
        );
        let spec = JobSpec {
            job_id: job_id.clone(),
            pipeline_id: pipeline_id.clone(),
            schedule,
            document_paths,
            run_metadata,
        };
        let handle = self.spawn_job(spec.clone());

        let mut jobs = self.jobs.lock();
        if let Some(previous) = jobs.insert(
            pipeline_id.as_str().to_string(),
            ScheduledJob { spec, handle },
        ) {
            previous.handle.abort();
        }
        drop(jobs);

        self.logs
            .append(
                &LogEntry::new(
                    LogLevel::Info,
                    format!(
                        "Pipeline scheduled: {} with cron {}",
                        pipeline_id, cron_expression
                    ),
                )
                .with_pipeline(pipeline_id.as_str())
                .with_extra(json!({"job_id": job_id, "cron_expression": cron_expression})),
            )
            .await?;

        Ok(job_id)
    }

    /// Replaces the trigger of an existing job, keeping its job id,
    /// document list, and metadata.
    pub async fn reschedule_pipeline(
        &self,
        pipeline_id: &PipelineId,
        cron_expression: &str,
    ) -> Result<(), EtlError> {
        let schedule = CronSchedule::parse(cron_expression)?;

        let mut spec = {
            let jobs = self.jobs.lock();
            jobs.get(pipeline_id.as_str())
                .map(|job| job.spec.clone())
                .ok_or_else(|| {
                    EtlError::NotFound(format!("no schedule for pipeline: {}", pipeline_id))
                })?
        };
        spec.schedule = schedule;

        let handle = self.spawn_job(spec.clone());
        let mut jobs = self.jobs.lock();
        if let Some(previous) = jobs.insert(
            pipeline_id.as_str().to_string(),
            ScheduledJob { spec, handle },
        ) {
            previous.handle.abort();
        }
        Ok(())
    }

    /// Removes the pipeline's job. In-flight launches complete.
    pub fn cancel_scheduled_pipeline(&self, pipeline_id: &PipelineId) -> bool {
        match self.jobs.lock().remove(pipeline_id.as_str()) {
            Some(job) => {
                job.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Global pause: ticks fire but log MISSED instead of launching.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Job id for a pipeline, when scheduled.
    pub fn job_id_for(&self, pipeline_id: &PipelineId) -> Option<String> {
        self.jobs
            .lock()
            .get(pipeline_id.as_str())
            .map(|job| job.spec.job_id.clone())
    }

    pub fn scheduled_count(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Registers schedules for every stored pipeline carrying a cron
    /// expression. Used at startup with `--start-scheduler`.
    pub async fn schedule_stored_pipelines(&self) -> Result<usize, EtlError> {
        let pipelines = self.manager.list_pipelines(true).await?;
        let mut scheduled = 0usize;
        for config in pipelines {
            let Some(expression) = config.schedule.clone().filter(|s| !s.trim().is_empty()) else {
                continue;
            };
            let paths: Vec<PathBuf> = config
                .source_config
                .get("document_paths")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(PathBuf::from)
                        .collect()
                })
                .unwrap_or_default();
            if paths.is_empty() {
                tracing::warn!(
                    pipeline = %config.id,
                    "schedule present but no document_paths in source_config; skipping"
                );
                continue;
            }
            self.schedule_pipeline(&config.id, &expression, paths, json!({"trigger": "schedule"}))
                .await?;
            scheduled += 1;
        }
        Ok(scheduled)
    }

    /// Aborts every job task.
    pub fn shutdown(&self) {
        for (_, job) in self.jobs.lock().drain() {
            job.handle.abort();
        }
    }
}

impl Drop for SchedulerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    use crate::application::document_executor::DocumentExecutor;
    use crate::application::resource_monitor::{ResourceMonitor, ResourceProbe, ResourceSample};
    use crate::application::task_dispatcher::{DispatcherConfig, TaskDispatcher};
    use crate::infrastructure::loaders::LoaderFactory;
    use crate::infrastructure::processors::ProcessorRegistry;
    use crate::infrastructure::script::crypto::{CryptoService, MasterKey};
    use crate::infrastructure::script::{ScriptSandbox, ScriptStore};
    use crate::infrastructure::storage::SqliteMetadataStore;
    use text_etl_domain::entities::pipeline::{PipelineConfig, StepConfig, StepKind};

    struct CalmProbe;

    impl ResourceProbe for CalmProbe {
        fn sample(&self) -> ResourceSample {
            ResourceSample::now(10.0, 10.0, 10.0)
        }
    }

    async fn scheduler() -> (SchedulerService, Arc<PipelineManager>, Arc<SqliteMetadataStore>) {
        let store = Arc::new(SqliteMetadataStore::in_memory().await.unwrap());
        let crypto = Arc::new(CryptoService::new(&MasterKey::generate().unwrap()));
        let scripts = Arc::new(ScriptStore::new(store.clone(), crypto));
        let executor = Arc::new(DocumentExecutor::new(
            Arc::new(LoaderFactory::standard()),
            Arc::new(ProcessorRegistry::standard()),
            scripts.clone(),
            ScriptSandbox::new(),
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        let dispatcher = Arc::new(TaskDispatcher::new(
            executor,
            Arc::new(ResourceMonitor::new(Arc::new(CalmProbe))),
            DispatcherConfig::for_cores(2),
        ));
        let manager = Arc::new(PipelineManager::new(
            store.clone(),
            store.clone(),
            store.clone(),
            scripts,
            dispatcher,
        ));
        (
            SchedulerService::new(manager.clone(), store.clone()),
            manager,
            store,
        )
    }

    fn pipeline() -> PipelineConfig {
        let step = StepConfig::new(StepKind::DocumentLoader, "load")
            .with_id("load")
            .with_params(json!({"source_path": "/tmp"}));
        PipelineConfig::new("scheduled", vec![step])
    }

    #[tokio::test]
    async fn test_schedule_rejects_invalid_cron() {
        let (scheduler, manager, _) = scheduler().await;
        let id = manager.create_pipeline(pipeline()).await.unwrap();
        let err = scheduler
            .schedule_pipeline(&id, "0 61 * * *", vec![], json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(scheduler.scheduled_count(), 0);
    }

    #[tokio::test]
    async fn test_schedule_rejects_unknown_pipeline() {
        let (scheduler, _, _) = scheduler().await;
        let missing = PipelineId::parse("pipeline_ghost").unwrap();
        let err = scheduler
            .schedule_pipeline(&missing, "0 2 * * *", vec![], json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_one_job_per_pipeline_and_replacement() {
        let (scheduler, manager, _) = scheduler().await;
        let id = manager.create_pipeline(pipeline()).await.unwrap();

        let first = scheduler
            .schedule_pipeline(&id, "0 2 * * *", vec![], json!({}))
            .await
            .unwrap();
        let second = scheduler
            .schedule_pipeline(&id, "0 3 * * *", vec![], json!({}))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(scheduler.scheduled_count(), 1);
        assert_eq!(scheduler.job_id_for(&id), Some(second));
    }

    #[tokio::test]
    async fn test_reschedule_keeps_job_id() {
        let (scheduler, manager, _) = scheduler().await;
        let id = manager.create_pipeline(pipeline()).await.unwrap();
        let job_id = scheduler
            .schedule_pipeline(&id, "0 2 * * *", vec![], json!({}))
            .await
            .unwrap();

        scheduler.reschedule_pipeline(&id, "30 4 * * *").await.unwrap();
        assert_eq!(scheduler.job_id_for(&id), Some(job_id));

        assert!(scheduler
            .reschedule_pipeline(&PipelineId::parse("pipeline_ghost").unwrap(), "0 1 * * *")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_cancel_removes_job() {
        let (scheduler, manager, _) = scheduler().await;
        let id = manager.create_pipeline(pipeline()).await.unwrap();
        scheduler
            .schedule_pipeline(&id, "0 2 * * *", vec![], json!({}))
            .await
            .unwrap();

        assert!(scheduler.cancel_scheduled_pipeline(&id));
        assert_eq!(scheduler.scheduled_count(), 0);
        assert!(!scheduler.cancel_scheduled_pipeline(&id));
    }

    #[tokio::test]
    async fn test_pause_resume_is_global() {
        let (scheduler, _, _) = scheduler().await;
        assert!(!scheduler.is_paused());
        scheduler.pause();
        assert!(scheduler.is_paused());
        scheduler.resume();
        assert!(!scheduler.is_paused());
    }

    #[tokio::test]
    async fn test_schedule_stored_pipelines() {
        let (scheduler, manager, _) = scheduler().await;
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"content").unwrap();

        let mut config = pipeline();
        config.schedule = Some("0 2 * * *".to_string());
        config.source_config = json!({"document_paths": [file.path()]});
        manager.create_pipeline(config).await.unwrap();

        // One without schedule
        manager.create_pipeline(pipeline()).await.unwrap();

        let scheduled = scheduler.schedule_stored_pipelines().await.unwrap();
        assert_eq!(scheduled, 1);
        assert_eq!(scheduler.scheduled_count(), 1);
    }
}
