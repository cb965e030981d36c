// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document Executor
//!
//! Runs one pipeline against one document:
//!
//! 1. creates a `PipelineRun` with the single document path, status
//!    RUNNING;
//! 2. selects a loader and loads the document with the style
//!    configuration referenced in `source_config`;
//! 3. executes the steps in configuration order, resolving each step's
//!    input (`input_step_id` output, or the loaded document), stamping
//!    `document_id`/`page_num`/run id on chunks cut from pages, recording
//!    per-step timings, and honoring `optional: true` on step failure;
//! 4. checks the cancellation token at every step boundary (in-flight
//!    steps run to completion);
//! 5. persists the final chunk list and the completed run.
//!
//! Aborted documents are handed to the error-recovery service by the
//! dispatcher.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use text_etl_bootstrap::shutdown::CancellationToken;
use text_etl_domain::entities::chunk::Chunk;
use text_etl_domain::entities::document::Document;
use text_etl_domain::entities::pipeline::{PipelineConfig, StepConfig, StepKind};
use text_etl_domain::entities::pipeline_run::{PipelineRun, RunStatus};
use text_etl_domain::error::EtlError;
use text_etl_domain::repositories::log_repository::{
    ChunkRepository, LogEntry, LogLevel, LogRepository,
};
use text_etl_domain::repositories::pipeline_repository::RunRepository;
use text_etl_domain::services::chunk_exporter::ChunkExporter;
use text_etl_domain::services::chunk_processor::{ChunkProcessor, ProcessorInput};
use text_etl_domain::services::document_loader::{LoadRequest, PaginationPolicy};
use text_etl_domain::value_objects::ids::ScriptId;

use crate::infrastructure::config::load_style_config;
use crate::infrastructure::exporters::create_exporter;
use crate::infrastructure::loaders::LoaderFactory;
use crate::infrastructure::processors::{MetadataPropagator, ProcessorRegistry};
use crate::infrastructure::script::{ScriptSandbox, ScriptStore};

/// Elapsed time and output size of one executed step.
#[derive(Debug, Clone)]
pub struct StepTiming {
    pub step_id: String,
    pub name: String,
    pub kind: StepKind,
    pub elapsed: Duration,
    pub output_count: usize,
}

/// Result of processing one document.
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub run: PipelineRun,
    pub chunks: Vec<Chunk>,
    pub step_timings: Vec<StepTiming>,
}

/// Port the dispatcher and recovery service drive documents through.
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    async fn process_document(
        &self,
        config: &PipelineConfig,
        path: &Path,
        run_metadata: &Value,
        cancel: &CancellationToken,
    ) -> Result<DocumentReport, EtlError>;
}

/// Output of one step, kept for downstream input resolution.
enum StepData {
    /// The step's output is the (possibly section-enriched) document.
    Document,
    Chunks(Vec<Chunk>),
    Value(Value),
}

/// Borrowed view of a step's input.
enum StepInput<'a> {
    Document,
    Chunks(&'a [Chunk]),
    Value(&'a Value),
}

/// The per-document execution engine.
pub struct DocumentExecutor {
    loaders: Arc<LoaderFactory>,
    processors: Arc<ProcessorRegistry>,
    scripts: Arc<ScriptStore>,
    sandbox: ScriptSandbox,
    runs: Arc<dyn RunRepository>,
    chunks: Arc<dyn ChunkRepository>,
    logs: Arc<dyn LogRepository>,
}

impl DocumentExecutor {
    pub fn new(
        loaders: Arc<LoaderFactory>,
        processors: Arc<ProcessorRegistry>,
        scripts: Arc<ScriptStore>,
        sandbox: ScriptSandbox,
        runs: Arc<dyn RunRepository>,
        chunks: Arc<dyn ChunkRepository>,
        logs: Arc<dyn LogRepository>,
    ) -> Self {
        Self {
            loaders,
            processors,
            scripts,
            sandbox,
            runs,
            chunks,
            logs,
        }
    }

    /// Builds the load request from the pipeline's `source_config`.
    async fn build_load_request(
        &self,
        config: &PipelineConfig,
        path: &Path,
    ) -> Result<LoadRequest, EtlError> {
        let mut request = LoadRequest::new(path);

        if let Some(style_path) = config
            .source_config
            .get("style_config_path")
            .and_then(Value::as_str)
        {
            request = request.with_header_styles(load_style_config(Path::new(style_path)).await?);
        } else if let Some(definitions) = config.source_config.get("header_style_definitions") {
            request = request.with_header_styles(serde_json::from_value(definitions.clone())?);
        }

        if let Some(per_page) = config
            .source_config
            .get("paragraphs_per_page")
            .and_then(Value::as_u64)
        {
            request = request.with_pagination(PaginationPolicy::ByParagraphs(per_page as usize));
        } else if let Some(budget) = config
            .source_config
            .get("chars_per_page")
            .and_then(Value::as_u64)
        {
            request = request.with_pagination(PaginationPolicy::ByCharBudget(budget as usize));
        }

        Ok(request)
    }

    fn resolve_input<'a>(
        step: &StepConfig,
        outputs: &'a HashMap<String, StepData>,
    ) -> StepInput<'a> {
        if let Some(input_id) = &step.input_step_id {
            match outputs.get(input_id) {
                Some(StepData::Chunks(chunks)) => return StepInput::Chunks(chunks),
                Some(StepData::Value(value)) => return StepInput::Value(value),
                Some(StepData::Document) | None => return StepInput::Document,
            }
        }
        StepInput::Document
    }

    fn input_as_context(input: &StepInput<'_>, document: &Document) -> Value {
        match input {
            StepInput::Document => json!({
                "id": document.id,
                "path": document.path,
                "format": document.format,
                "title": document.title,
                "page_count": document.pages().len(),
            }),
            StepInput::Chunks(chunks) => {
                Value::Array(chunks.iter().map(|c| json!(c.to_record())).collect())
            }
            StepInput::Value(value) => (*value).clone(),
        }
    }

    /// Stamps the run id onto chunks that do not carry one yet.
    fn stamp_run_id(chunks: &mut [Chunk], run: &PipelineRun) {
        for chunk in chunks {
            if chunk.meta().pipeline_run_id().is_none() {
                let meta = chunk.meta().clone().with_pipeline_run_id(run.id.as_str());
                *chunk.meta_mut() = meta;
            }
        }
    }

    async fn execute_step(
        &self,
        step: &StepConfig,
        document: &mut Document,
        outputs: &HashMap<String, StepData>,
        run: &PipelineRun,
    ) -> Result<StepData, EtlError> {
        let input = Self::resolve_input(step, outputs);

        match step.kind {
            StepKind::DocumentLoader => Ok(StepData::Document),

            StepKind::MetadataPropagator => match input {
                StepInput::Document => {
                    let propagator = MetadataPropagator::default();
                    let added = propagator.detect_and_attach(document, &step.params)?;
                    tracing::debug!(step = %step.id, sections = added, "sections attached");
                    Ok(StepData::Document)
                }
                StepInput::Chunks(chunks) => {
                    let processor = self
                        .processors
                        .get(step.kind)
                        .ok_or_else(|| EtlError::InternalError("propagator unbound".to_string()))?;
                    let mut out = processor.process(ProcessorInput::Chunks(chunks), &step.params)?;
                    Self::stamp_run_id(&mut out, run);
                    Ok(StepData::Chunks(out))
                }
                StepInput::Value(_) => Err(EtlError::InvalidConfiguration(format!(
                    "step {} cannot propagate metadata over a script value",
                    step.id
                ))),
            },

            StepKind::LineSplitter
            | StepKind::ParagraphSplitter
            | StepKind::SentenceSplitter
            | StepKind::DelimiterSplitter
            | StepKind::RegexExtractor => {
                let processor = self.processors.get(step.kind).ok_or_else(|| {
                    EtlError::InternalError(format!("no processor bound to {}", step.kind))
                })?;
                let mut out = match input {
                    StepInput::Document => {
                        processor.process(ProcessorInput::Document(document), &step.params)?
                    }
                    StepInput::Chunks(chunks) => {
                        processor.process(ProcessorInput::Chunks(chunks), &step.params)?
                    }
                    StepInput::Value(_) => {
                        return Err(EtlError::InvalidConfiguration(format!(
                            "step {} expects a document or chunks as input",
                            step.id
                        )))
                    }
                };
                Self::stamp_run_id(&mut out, run);
                Ok(StepData::Chunks(out))
            }

            StepKind::UserScript => {
                let script_id = step.param_str("script_id").ok_or_else(|| {
                    EtlError::InvalidConfiguration(format!(
                        "script step {} requires 'script_id'",
                        step.id
                    ))
                })?;
                let context = json!({
                    "input": Self::input_as_context(&input, document),
                    "metadata": {
                        "document_id": document.id,
                        "pipeline_id": run.pipeline_id,
                        "run_id": run.id,
                    },
                });
                let outcome = self
                    .scripts
                    .validate_and_execute(&ScriptId::parse(script_id)?, &context, &self.sandbox)
                    .await?;
                Ok(StepData::Value(outcome.value))
            }

            StepKind::DbExporter | StepKind::FileExporter | StepKind::JsonExporter => {
                let chunks: Vec<Chunk> = match input {
                    StepInput::Chunks(chunks) => chunks.to_vec(),
                    _ => {
                        return Err(EtlError::InvalidConfiguration(format!(
                            "exporter step {} requires chunk input",
                            step.id
                        )))
                    }
                };

                let mut exporter = create_exporter(step.kind, &step.params)?;
                let connect_config = match step.kind {
                    StepKind::DbExporter => step
                        .params
                        .get("db_config")
                        .cloned()
                        .unwrap_or_else(|| json!({})),
                    _ => step.params.clone(),
                };
                exporter.connect(&connect_config).await?;

                let destination = match step.kind {
                    StepKind::DbExporter => step.param_str("table_name").unwrap_or("chunks").to_string(),
                    _ => step.param_str("file_name").unwrap_or("").to_string(),
                };
                exporter.batch_insert(&chunks, &destination).await?;
                if step.param_bool("export_run_metadata") {
                    exporter.export_run_metadata(run).await?;
                }
                exporter.close().await?;

                // Side-effect only: downstream steps observe the input
                Ok(StepData::Chunks(chunks))
            }
        }
    }

    async fn run_steps(
        &self,
        config: &PipelineConfig,
        path: &Path,
        run: &mut PipelineRun,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Chunk>, Vec<StepTiming>), EtlError> {
        let request = self.build_load_request(config, path).await?;
        let mut document = self.loaders.load(&request).await?;

        let mut outputs: HashMap<String, StepData> = HashMap::new();
        let mut latest_chunks: Vec<Chunk> = Vec::new();
        let mut timings = Vec::new();

        for step in &config.steps {
            // Cooperative cancellation at step boundaries
            if cancel.is_cancelled() {
                return Err(EtlError::Cancelled("pipeline run cancelled".to_string()));
            }

            let started = Instant::now();
            match self.execute_step(step, &mut document, &outputs, run).await {
                Ok(output) => {
                    let output_count = match &output {
                        StepData::Chunks(chunks) => chunks.len(),
                        _ => 1,
                    };
                    if let StepData::Chunks(chunks) = &output {
                        latest_chunks = chunks.clone();
                    }
                    let elapsed = started.elapsed();
                    timings.push(StepTiming {
                        step_id: step.id.clone(),
                        name: step.name.clone(),
                        kind: step.kind,
                        elapsed,
                        output_count,
                    });
                    outputs.insert(step.id.clone(), output);

                    self.logs
                        .append(
                            &LogEntry::new(LogLevel::Info, format!("Step completed: {}", step.name))
                                .with_pipeline(run.pipeline_id.as_str())
                                .with_run(run.id.as_str())
                                .with_extra(json!({
                                    "step_id": step.id,
                                    "execution_time_ms": elapsed.as_millis() as u64,
                                    "output_count": output_count,
                                })),
                        )
                        .await?;
                }
                Err(err) => {
                    let stage = format!("step_{}", step.name);
                    run.record_step_error(&err, &step.id, &stage);
                    self.logs
                        .append(
                            &LogEntry::new(
                                LogLevel::Error,
                                format!("Step failed: {} - {}", step.name, err),
                            )
                            .with_pipeline(run.pipeline_id.as_str())
                            .with_run(run.id.as_str())
                            .with_extra(json!({
                                "step_id": step.id,
                                "error_kind": err.kind(),
                                "execution_time_ms": started.elapsed().as_millis() as u64,
                            })),
                        )
                        .await?;

                    if step.is_optional() {
                        outputs.insert(step.id.clone(), StepData::Chunks(Vec::new()));
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Ok((latest_chunks, timings))
    }
}

#[async_trait]
impl DocumentProcessor for DocumentExecutor {
    async fn process_document(
        &self,
        config: &PipelineConfig,
        path: &Path,
        run_metadata: &Value,
        cancel: &CancellationToken,
    ) -> Result<DocumentReport, EtlError> {
        if !path.exists() {
            return Err(EtlError::IoError(format!(
                "document path does not exist: {}",
                path.display()
            )));
        }

        let path_string = path.display().to_string();
        let mut run = PipelineRun::new(config.id.clone(), vec![path_string.clone()])
            .with_metadata(json!({
                "source_document": path_string,
                "run_metadata": run_metadata,
            }));
        run.start();
        self.runs.save(&run).await?;

        match self.run_steps(config, path, &mut run, cancel).await {
            Ok((chunks, step_timings)) => {
                self.chunks.insert_chunks(&chunks, run.id.as_str()).await?;
                run.processed_count = 1;
                run.success_count = 1;
                run.complete(RunStatus::Completed);
                self.runs.save(&run).await?;
                Ok(DocumentReport {
                    run,
                    chunks,
                    step_timings,
                })
            }
            Err(err) if err.is_cancellation() => {
                run.processed_count = 1;
                run.complete(RunStatus::Cancelled);
                self.runs.save(&run).await?;
                Err(err)
            }
            Err(err) => {
                run.processed_count = 1;
                run.add_error(&err, None, Some("document"), Some(&path_string));
                run.complete(RunStatus::Failed);
                self.runs.save(&run).await?;
                self.logs
                    .append(
                        &LogEntry::new(
                            LogLevel::Error,
                            format!("Document processing failed: {}", path_string),
                        )
                        .with_pipeline(run.pipeline_id.as_str())
                        .with_run(run.id.as_str())
                        .with_document(&path_string)
                        .with_extra(json!({"error_kind": err.kind(), "error": err.to_string()})),
                    )
                    .await?;
                Err(err)
            }
        }
    }
}
