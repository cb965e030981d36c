// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Dispatcher and Recovery Integration Test
//!
//! Adaptive dispatch with a scripted resource probe, and the recovery
//! path for documents that fail processing.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use crate::common::{engine_with, write_fixture};
use text_etl::application::error_recovery::ErrorRecoveryService;
use text_etl::infrastructure::loaders::LoaderFactory;
use text_etl::application::resource_monitor::{ResourceProbe, ResourceSample};
use text_etl_bootstrap::shutdown::CancellationToken;
use text_etl_domain::entities::pipeline::{PipelineConfig, StepConfig, StepKind};
use text_etl_domain::services::recovery_classifier::RecoveryStrategy;

/// Probe replaying scripted values, calm afterwards.
struct SequenceProbe {
    samples: Mutex<VecDeque<(f32, f32)>>,
}

impl SequenceProbe {
    fn new(values: Vec<(f32, f32)>) -> Arc<Self> {
        Arc::new(Self {
            samples: Mutex::new(values.into()),
        })
    }
}

impl ResourceProbe for SequenceProbe {
    fn sample(&self) -> ResourceSample {
        let (cpu, memory) = self.samples.lock().pop_front().unwrap_or((10.0, 10.0));
        ResourceSample::now(cpu, memory, 15.0)
    }
}

fn line_pipeline() -> PipelineConfig {
    PipelineConfig::new(
        "dispatch",
        vec![
            StepConfig::new(StepKind::DocumentLoader, "load")
                .with_id("load")
                .with_params(json!({"source_path": "/tmp"})),
            StepConfig::new(StepKind::LineSplitter, "split")
                .with_id("split")
                .with_input("load"),
        ],
    )
}

/// Forty documents, CPU reported high after the first batch: workers step
/// down at a batch boundary, the adjustment is recorded, and every
/// document still processes.
#[tokio::test]
async fn test_adaptive_dispatch_adjusts_and_processes_all() {
    // First inter-batch sample: CPU 85% -> reduce; later samples calm
    let probe = SequenceProbe::new(vec![(85.0, 40.0)]);
    let engine = engine_with(LoaderFactory::standard(), probe).await;

    let files: Vec<_> = (0..40)
        .map(|i| write_fixture(".txt", format!("doc {}\nline two\n", i).as_bytes()))
        .collect();
    let paths: Vec<_> = files.iter().map(|f| f.path().to_path_buf()).collect();

    let outcome = engine
        .dispatcher
        .process_adaptive(
            &line_pipeline(),
            &paths,
            &json!({}),
            &CancellationToken::never(),
        )
        .await;

    assert_eq!(outcome.processed_count, 40);
    assert_eq!(outcome.success_count, 40);
    assert!(!outcome.adjustments.is_empty());
    assert_eq!(outcome.adjustments[0].action, "reduce_workers");
    assert_eq!(outcome.adjustments[0].to, outcome.adjustments[0].from - 1);
}

/// An out-of-memory message selects the fallback strategy; the attempt is
/// recorded with its outcome.
#[tokio::test]
async fn test_recovery_selects_fallback_for_memory_errors() {
    let engine = engine_with(LoaderFactory::standard(), SequenceProbe::new(vec![])).await;
    let recovery = ErrorRecoveryService::new(engine.executor.clone(), engine.store.clone());

    assert_eq!(
        recovery.select_strategy("worker reported out of memory"),
        RecoveryStrategy::Fallback
    );

    let outcome = recovery
        .handle_document_failure(
            &line_pipeline(),
            std::path::Path::new("big_scan.pdf"),
            "out of memory while rasterizing",
            &CancellationToken::never(),
        )
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.strategy, Some(RecoveryStrategy::Fallback));
    assert!(!outcome.attempts.is_empty());
    assert!(outcome.attempts[0].success);
    assert!(outcome.actions[0].contains("OCR"));
}

/// A transient failure recovers through retry: the document exists, and
/// re-execution through the real executor succeeds.
#[tokio::test]
async fn test_recovery_retry_reprocesses_real_document() {
    let engine = engine_with(LoaderFactory::standard(), SequenceProbe::new(vec![])).await;
    let recovery = ErrorRecoveryService::new(engine.executor.clone(), engine.store.clone());
    let file = write_fixture(".txt", b"recoverable\n");

    let outcome = recovery
        .handle_document_failure(
            &line_pipeline(),
            file.path(),
            "connection reset during export",
            &CancellationToken::never(),
        )
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.strategy, Some(RecoveryStrategy::Retry));
}

/// When retry and fallback cannot succeed (the file is gone), the skip
/// strategy closes out recovery.
#[tokio::test]
async fn test_recovery_falls_through_to_skip() {
    let engine = engine_with(LoaderFactory::standard(), SequenceProbe::new(vec![])).await;
    let recovery = ErrorRecoveryService::new(engine.executor.clone(), engine.store.clone());

    let outcome = recovery
        .handle_document_failure(
            &line_pipeline(),
            std::path::Path::new("/gone/forever.txt"),
            "mysterious failure",
            &CancellationToken::never(),
        )
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.strategy, Some(RecoveryStrategy::Skip));
    assert_eq!(outcome.attempts.len(), 3);
}
