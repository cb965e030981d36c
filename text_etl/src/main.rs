// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Text ETL Batch Entry Point
//!
//! Command-line entry for the document-processing ETL engine:
//!
//! - `--batch-mode` processes `--input-files` through the pipeline from
//!   `--config-file` (or a built-in default pipeline) and exits;
//! - without batch mode the process stays up as a service, optionally
//!   running the cron scheduler (`--start-scheduler`), until SIGINT;
//! - exit codes: 0 on success and on interruption, 1 on fatal error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tracing::{error, info, warn};

use text_etl::application::document_executor::DocumentExecutor;
use text_etl::application::error_recovery::ErrorRecoveryService;
use text_etl::application::pipeline_manager::{ExecutionMode, PipelineManager};
use text_etl::application::resource_monitor::ResourceMonitor;
use text_etl::application::scheduler::SchedulerService;
use text_etl::application::task_dispatcher::{DispatcherConfig, TaskDispatcher};
use text_etl::infrastructure::config::load_pipeline_config;
use text_etl::infrastructure::loaders::LoaderFactory;
use text_etl::infrastructure::logging::init_tracing;
use text_etl::infrastructure::probes::SysinfoProbe;
use text_etl::infrastructure::processors::ProcessorRegistry;
use text_etl::infrastructure::script::{CryptoService, MasterKey, ScriptSandbox, ScriptStore};
use text_etl::infrastructure::storage::SqliteMetadataStore;
use text_etl_bootstrap::cli::parse_cli;
use text_etl_bootstrap::platform::create_platform;
use text_etl_bootstrap::shutdown::{wait_for_signal, ShutdownCoordinator};
use text_etl_bootstrap::{EXIT_FAILURE, EXIT_SUCCESS};
use text_etl_domain::entities::pipeline::{PipelineConfig, StepConfig, StepKind};

/// Wired service graph.
struct Services {
    manager: Arc<PipelineManager>,
    scheduler: Arc<SchedulerService>,
    monitor: Arc<ResourceMonitor>,
}

async fn build_services(store: Arc<SqliteMetadataStore>) -> anyhow::Result<Services> {
    let master_key = MasterKey::from_env().context("resolving master encryption key")?;
    let crypto = Arc::new(CryptoService::new(&master_key));
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

    let monitor = Arc::new(ResourceMonitor::new(Arc::new(SysinfoProbe::new())));
    monitor.start();

    let recovery = Arc::new(ErrorRecoveryService::new(executor.clone(), store.clone()));

    let platform = create_platform();
    let dispatcher = Arc::new(
        TaskDispatcher::new(
            executor,
            monitor.clone(),
            DispatcherConfig::for_cores(platform.available_cores()),
        )
        .with_recovery(recovery),
    );

    let manager = Arc::new(PipelineManager::new(
        store.clone(),
        store.clone(),
        store.clone(),
        scripts,
        dispatcher,
    ));
    let scheduler = Arc::new(SchedulerService::new(manager.clone(), store));

    Ok(Services {
        manager,
        scheduler,
        monitor,
    })
}

/// Fallback pipeline when batch mode runs without `--config-file`:
/// load, split into lines, export JSON into `./output/`.
fn default_pipeline() -> PipelineConfig {
    let steps = vec![
        StepConfig::new(StepKind::DocumentLoader, "Load documents")
            .with_id("load")
            .with_params(json!({"source_path": "."})),
        StepConfig::new(StepKind::LineSplitter, "Split lines")
            .with_id("split")
            .with_input("load"),
        StepConfig::new(StepKind::JsonExporter, "Export chunks")
            .with_id("export")
            .with_params(json!({"output_path": "./output", "file_name": "chunks.json"}))
            .with_input("split"),
    ];
    let mut config = PipelineConfig::new("default_batch_pipeline", steps);
    config.description = "Built-in batch pipeline: lines to JSON".to_string();
    config
}

async fn run_batch_mode(
    services: &Services,
    config_file: Option<&PathBuf>,
    input_files: &[PathBuf],
) -> anyhow::Result<i32> {
    let config = match config_file {
        Some(path) => load_pipeline_config(path)
            .await
            .with_context(|| format!("loading pipeline config {}", path.display()))?,
        None => default_pipeline(),
    };

    // The run references the stored pipeline; register or refresh it
    let pipeline_id = match services.manager.get_pipeline(&config.id).await? {
        Some(_) => {
            services.manager.update_pipeline(config.clone()).await?;
            config.id.clone()
        }
        None => services.manager.create_pipeline(config.clone()).await?,
    };

    let existing: Vec<PathBuf> = input_files
        .iter()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                warn!("File not found, skipping: {}", path.display());
            }
            exists
        })
        .cloned()
        .collect();
    if existing.is_empty() {
        anyhow::bail!("none of the input files exist");
    }

    info!("Processing {} files...", existing.len());
    let run_id = services
        .manager
        .execute(
            &pipeline_id,
            existing,
            json!({"trigger": "batch_cli"}),
            ExecutionMode::Parallel,
        )
        .await?;

    let history = services.manager.run_history(&pipeline_id, 1).await?;
    if let Some(run) = history.first() {
        info!(
            "Run {} finished: status={} processed={} success={} error={}",
            run_id, run.status, run.processed_count, run.success_count, run.error_count
        );
        for err in run.errors.iter().take(5) {
            error!(
                "  {} [{}] {}",
                err.document_path.as_deref().unwrap_or("-"),
                err.kind,
                err.message
            );
        }
        if run.error_count > 0 && run.success_count == 0 {
            return Ok(EXIT_FAILURE);
        }
    }
    Ok(EXIT_SUCCESS)
}

async fn run() -> anyhow::Result<i32> {
    let cli = parse_cli()
        .validate()
        .map_err(|message| anyhow::anyhow!(message))?;

    init_tracing(cli.log_level.as_filter());
    info!("Starting text_etl (db: {})", cli.db_path.display());

    let store = Arc::new(
        SqliteMetadataStore::open(&cli.db_path.display().to_string())
            .await
            .context("opening metadata store")?,
    );
    let services = build_services(store).await?;

    if cli.start_scheduler {
        let scheduled = services.scheduler.schedule_stored_pipelines().await?;
        info!("Scheduler started with {} jobs", scheduled);
    }

    let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));

    let exit_code = if cli.batch_mode {
        // SIGINT during a batch is a cooperative exit with code 0
        tokio::select! {
            result = run_batch_mode(&services, cli.config_file.as_ref(), &cli.input_files) => result?,
            _ = wait_for_signal() => {
                warn!("Interrupted; shutting down");
                coordinator.initiate_shutdown();
                EXIT_SUCCESS
            }
        }
    } else {
        info!("Running in service mode; press Ctrl-C to stop");
        wait_for_signal().await;
        coordinator.initiate_shutdown();
        EXIT_SUCCESS
    };

    services.scheduler.shutdown();
    services.monitor.stop();
    coordinator.complete_shutdown();
    info!("Shutdown complete");
    Ok(exit_code)
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            // The subscriber may not be installed yet (argument errors)
            eprintln!("Fatal error: {:#}", err);
            std::process::exit(EXIT_FAILURE);
        }
    }
}
