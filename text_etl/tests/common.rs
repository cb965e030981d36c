// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Common Test Helpers
//!
//! Shared fixtures for integration and end-to-end tests: an in-memory
//! engine wiring, canned parser backends, and file fixtures.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use text_etl::application::document_executor::DocumentExecutor;
use text_etl::application::pipeline_manager::PipelineManager;
use text_etl::application::resource_monitor::{ResourceMonitor, ResourceProbe, ResourceSample};
use text_etl::application::task_dispatcher::{DispatcherConfig, TaskDispatcher};
use text_etl::infrastructure::loaders::{
    LoaderFactory, PdfBackend, PdfContent, PdfLoader, PdfPage,
};
use text_etl::infrastructure::processors::ProcessorRegistry;
use text_etl::infrastructure::script::crypto::{CryptoService, MasterKey};
use text_etl::infrastructure::script::{ScriptSandbox, ScriptStore};
use text_etl::infrastructure::storage::SqliteMetadataStore;
use text_etl_domain::entities::document::TextSpan;
use text_etl_domain::error::EtlError;

/// Calm probe for deterministic dispatch tests.
pub struct CalmProbe;

impl ResourceProbe for CalmProbe {
    fn sample(&self) -> ResourceSample {
        ResourceSample::now(10.0, 10.0, 10.0)
    }
}

/// Canned PDF backend standing in for the external parser library.
pub struct CannedPdfBackend {
    pub content: PdfContent,
}

impl CannedPdfBackend {
    /// One-page backend with plain spans, one per line of `text`.
    pub fn single_page(text: &str) -> Self {
        let spans = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(TextSpan::plain)
            .collect();
        Self {
            content: PdfContent {
                pages: vec![PdfPage { spans }],
                title: String::new(),
                author: String::new(),
            },
        }
    }

    pub fn with_pages(pages: Vec<PdfPage>) -> Self {
        Self {
            content: PdfContent {
                pages,
                title: String::new(),
                author: String::new(),
            },
        }
    }
}

impl PdfBackend for CannedPdfBackend {
    fn read(&self, _path: &Path) -> Result<PdfContent, EtlError> {
        Ok(self.content.clone())
    }

    fn probe(&self, _path: &Path) -> Result<Map<String, Value>, EtlError> {
        let mut map = Map::new();
        map.insert("page_count".to_string(), json!(self.content.pages.len()));
        Ok(map)
    }
}

/// Fully wired engine over an in-memory metadata store.
pub struct TestEngine {
    pub store: Arc<SqliteMetadataStore>,
    pub scripts: Arc<ScriptStore>,
    pub executor: Arc<DocumentExecutor>,
    pub dispatcher: Arc<TaskDispatcher>,
    pub manager: Arc<PipelineManager>,
    pub monitor: Arc<ResourceMonitor>,
}

/// Builds the engine with a custom loader factory and probe.
pub async fn engine_with(factory: LoaderFactory, probe: Arc<dyn ResourceProbe>) -> TestEngine {
    let store = Arc::new(SqliteMetadataStore::in_memory().await.unwrap());
    let crypto = Arc::new(CryptoService::new(&MasterKey::generate().unwrap()));
    let scripts = Arc::new(ScriptStore::new(store.clone(), crypto));

    let executor = Arc::new(DocumentExecutor::new(
        Arc::new(factory),
        Arc::new(ProcessorRegistry::standard()),
        scripts.clone(),
        ScriptSandbox::new(),
        store.clone(),
        store.clone(),
        store.clone(),
    ));

    let monitor = Arc::new(ResourceMonitor::new(probe));
    let mut dispatcher_config = DispatcherConfig::for_cores(4);
    dispatcher_config.admission_backoff = std::time::Duration::from_millis(1);
    let dispatcher = Arc::new(TaskDispatcher::new(
        executor.clone(),
        monitor.clone(),
        dispatcher_config,
    ));

    let manager = Arc::new(PipelineManager::new(
        store.clone(),
        store.clone(),
        store.clone(),
        scripts.clone(),
        dispatcher.clone(),
    ));

    TestEngine {
        store,
        scripts,
        executor,
        dispatcher,
        manager,
        monitor,
    }
}

/// Default engine: TXT loader only, calm probe.
pub async fn engine() -> TestEngine {
    engine_with(LoaderFactory::standard(), Arc::new(CalmProbe)).await
}

/// Writes a temp file with the given suffix and content.
pub fn write_fixture(suffix: &str, content: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content).unwrap();
    file
}

/// Whether a python3 interpreter is available for sandbox tests.
pub fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .is_ok()
}
