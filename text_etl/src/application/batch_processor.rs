// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Batch Processor
//!
//! Document discovery and batch orchestration:
//!
//! - **Discovery**: a single file is accepted when it matches the
//!   patterns; a directory is walked recursively, matching file names
//!   against each glob pattern, with the union deduplicated and sorted.
//! - **Modes**: parallel, sequential, adaptive, and priority (priority
//!   patterns override normal ones; duplicates are removed from the
//!   normal lane).
//! - **Archival**: files older than N days move from a source tree to a
//!   mirror tree, preserving relative paths.
//! - **Temp cleanup**: top-level files older than N days are deleted.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use walkdir::WalkDir;

use text_etl_bootstrap::shutdown::CancellationToken;
use text_etl_domain::entities::pipeline::PipelineConfig;
use text_etl_domain::error::EtlError;

use super::task_dispatcher::{BatchOutcome, TaskDispatcher};

/// Default discovery patterns for supported document formats.
pub const DEFAULT_PATTERNS: &[&str] = &["*.pdf", "*.docx", "*.txt"];

/// Batch mode selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BatchMode {
    #[default]
    Parallel,
    Sequential,
    Adaptive,
    /// Priority patterns drain before the rest.
    Priority {
        priority_patterns: Vec<String>,
    },
}

/// Discovery plus dispatch over a document tree.
pub struct BatchProcessor {
    dispatcher: Arc<TaskDispatcher>,
}

impl BatchProcessor {
    pub fn new(dispatcher: Arc<TaskDispatcher>) -> Self {
        Self { dispatcher }
    }

    fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>, EtlError> {
        let effective: Vec<String> = if patterns.is_empty() {
            DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect()
        } else {
            patterns.to_vec()
        };
        effective
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| EtlError::InvalidConfiguration(format!("pattern '{}': {}", p, e)))
            })
            .collect()
    }

    fn matches_any(patterns: &[glob::Pattern], path: &Path) -> bool {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        patterns.iter().any(|p| p.matches(name))
    }

    /// Discovers documents under `source` matching the patterns.
    pub fn discover_documents(
        &self,
        source: &Path,
        patterns: &[String],
    ) -> Result<Vec<PathBuf>, EtlError> {
        let compiled = Self::compile_patterns(patterns)?;

        if source.is_file() {
            return Ok(if Self::matches_any(&compiled, source) {
                vec![source.to_path_buf()]
            } else {
                Vec::new()
            });
        }
        if !source.is_dir() {
            return Err(EtlError::IoError(format!(
                "source path does not exist: {}",
                source.display()
            )));
        }

        let mut found: BTreeSet<PathBuf> = BTreeSet::new();
        for entry in WalkDir::new(source).into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file() && Self::matches_any(&compiled, entry.path()) {
                found.insert(entry.path().to_path_buf());
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Discovers and processes a batch in the requested mode.
    pub async fn process_batch(
        &self,
        config: &PipelineConfig,
        source: &Path,
        patterns: &[String],
        mode: BatchMode,
        run_metadata: &Value,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, EtlError> {
        let documents = self.discover_documents(source, patterns)?;

        let outcome = match mode {
            BatchMode::Parallel => {
                self.dispatcher
                    .process_parallel(config, &documents, None, run_metadata, cancel)
                    .await
            }
            BatchMode::Sequential => {
                self.dispatcher
                    .process_sequential(config, &documents, run_metadata, cancel)
                    .await
            }
            BatchMode::Adaptive => {
                self.dispatcher
                    .process_adaptive(config, &documents, run_metadata, cancel)
                    .await
            }
            BatchMode::Priority { priority_patterns } => {
                let priority_compiled = Self::compile_patterns(&priority_patterns)?;
                let (priority, normal): (Vec<PathBuf>, Vec<PathBuf>) = documents
                    .into_iter()
                    .partition(|p| Self::matches_any(&priority_compiled, p));
                self.dispatcher
                    .process_priority(config, &priority, &normal, run_metadata, cancel)
                    .await
            }
        };

        Ok(outcome)
    }

    /// Moves files older than `days_old` from `source_dir` into a mirror
    /// tree under `archive_dir`, preserving relative paths.
    pub async fn archive_processed_documents(
        &self,
        source_dir: &Path,
        archive_dir: &Path,
        days_old: u64,
    ) -> Result<usize, EtlError> {
        let cutoff = SystemTime::now() - Duration::from_secs(days_old * 24 * 60 * 60);
        let compiled = Self::compile_patterns(&[])?;
        tokio::fs::create_dir_all(archive_dir).await?;

        let mut moved = 0usize;
        for entry in WalkDir::new(source_dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() || !Self::matches_any(&compiled, entry.path()) {
                continue;
            }
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok());
            let Some(modified) = modified else { continue };
            if modified >= cutoff {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(source_dir)
                .map_err(|e| EtlError::InternalError(format!("relative path: {}", e)))?;
            let target = archive_dir.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::rename(entry.path(), &target).await?;
            moved += 1;
        }
        Ok(moved)
    }

    /// Deletes top-level files in `temp_dir` older than `days_old`.
    pub async fn cleanup_temporary_files(
        &self,
        temp_dir: &Path,
        days_old: u64,
    ) -> Result<usize, EtlError> {
        if !temp_dir.exists() {
            return Ok(0);
        }
        let cutoff = SystemTime::now() - Duration::from_secs(days_old * 24 * 60 * 60);

        let mut deleted = 0usize;
        let mut entries = tokio::fs::read_dir(temp_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            if let Ok(modified) = metadata.modified() {
                if modified < cutoff {
                    tokio::fs::remove_file(entry.path()).await?;
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }
}
