// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Lifecycle Integration Test
//!
//! Exercises configuration CRUD, validation, execution, and the run
//! invariants against the in-memory metadata store.

use serde_json::json;

use crate::common::{engine, write_fixture};
use text_etl::application::pipeline_manager::ExecutionMode;
use text_etl_domain::entities::pipeline::{PipelineConfig, StepConfig, StepKind};
use text_etl_domain::entities::pipeline_run::RunStatus;
use text_etl_domain::repositories::pipeline_repository::RunRepository;

fn line_pipeline(name: &str) -> PipelineConfig {
    let steps = vec![
        StepConfig::new(StepKind::DocumentLoader, "load")
            .with_id("load")
            .with_params(json!({"source_path": "/tmp"})),
        StepConfig::new(StepKind::LineSplitter, "split")
            .with_id("split")
            .with_input("load"),
    ];
    PipelineConfig::new(name, steps)
}

#[tokio::test]
async fn test_validation_enumerates_all_failures() {
    let engine = engine().await;

    let mut config = PipelineConfig::new("", vec![]);
    config.schedule = Some("0 61 * * *".to_string());
    let errors = engine.manager.validate_pipeline(&config).await;

    assert!(errors.iter().any(|e| e.contains("name")));
    assert!(errors.iter().any(|e| e.contains("at least one step")));
    assert!(errors.iter().any(|e| e.contains("schedule")));
}

#[tokio::test]
async fn test_run_counters_satisfy_invariant() {
    let engine = engine().await;
    let id = engine.manager.create_pipeline(line_pipeline("inv")).await.unwrap();

    let files: Vec<_> = (0..3).map(|i| write_fixture(".txt", format!("doc {}\n", i).as_bytes())).collect();
    let paths = files.iter().map(|f| f.path().to_path_buf()).collect();

    let run_id = engine
        .manager
        .execute(&id, paths, json!({}), ExecutionMode::Parallel)
        .await
        .unwrap();

    let run = RunRepository::find_by_id(&*engine.store, &run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    // success + error <= processed <= |document_paths|, terminal iff ended
    run.validate().unwrap();
    assert_eq!(run.processed_count, 3);
    assert_eq!(run.success_count + run.error_count, 3);
}

#[tokio::test]
async fn test_update_and_delete_rejected_while_running() {
    // Simulate an active run by holding the registration through a
    // concurrent execute on a slow document set
    let engine = engine().await;
    let id = engine.manager.create_pipeline(line_pipeline("busy")).await.unwrap();

    // Register activity by executing concurrently with a large-ish batch
    let files: Vec<_> = (0..60).map(|i| write_fixture(".txt", format!("{}\n", i).as_bytes())).collect();
    let paths: Vec<_> = files.iter().map(|f| f.path().to_path_buf()).collect();

    let manager = engine.manager.clone();
    let exec_id = id.clone();
    let run_task = tokio::spawn(async move {
        manager
            .execute(&exec_id, paths, json!({}), ExecutionMode::Sequential)
            .await
    });

    // Poll until the run registers as active, then try to mutate
    let mut saw_rejection = false;
    for _ in 0..200 {
        if engine.manager.active_pipelines().contains(&id.as_str().to_string()) {
            let mut update = line_pipeline("busy");
            update.id = id.clone();
            assert!(engine.manager.update_pipeline(update).await.is_err());
            assert!(engine.manager.delete_pipeline(&id).await.is_err());
            saw_rejection = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    run_task.await.unwrap().unwrap();
    assert!(saw_rejection, "never observed the pipeline as active");
    // After completion, mutation is allowed again
    assert!(engine.manager.delete_pipeline(&id).await.unwrap());
}

#[tokio::test]
async fn test_cancel_flips_status_and_deregisters() {
    let engine = engine().await;
    let id = engine.manager.create_pipeline(line_pipeline("cancellable")).await.unwrap();

    let files: Vec<_> = (0..50).map(|i| write_fixture(".txt", format!("{}\n", i).as_bytes())).collect();
    let paths: Vec<_> = files.iter().map(|f| f.path().to_path_buf()).collect();

    let manager = engine.manager.clone();
    let exec_id = id.clone();
    let run_task = tokio::spawn(async move {
        manager
            .execute(&exec_id, paths, json!({}), ExecutionMode::Sequential)
            .await
    });

    let mut cancelled = false;
    for _ in 0..400 {
        if engine.manager.cancel(&id).await.unwrap() {
            cancelled = true;
            break;
        }
        if run_task.is_finished() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    let _ = run_task.await.unwrap();

    assert!(engine.manager.active_pipelines().is_empty());
    let history = engine.manager.run_history(&id, 1).await.unwrap();
    assert!(history[0].end_time.is_some());
    if cancelled {
        assert_eq!(history[0].status, RunStatus::Cancelled);
    } else {
        // The batch outran the cancel request; it must have completed
        assert_eq!(history[0].status, RunStatus::Completed);
    }
}

#[tokio::test]
async fn test_soft_deleted_pipelines_stay_in_history() {
    let engine = engine().await;
    let id = engine.manager.create_pipeline(line_pipeline("gone")).await.unwrap();
    assert!(engine.manager.delete_pipeline(&id).await.unwrap());

    assert!(engine.manager.get_pipeline(&id).await.unwrap().is_none());
    let all = engine.manager.list_pipelines(false).await.unwrap();
    assert_eq!(all.len(), 1);
}
