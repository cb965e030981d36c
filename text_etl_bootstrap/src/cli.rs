// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with a two-phase design:
//!
//! 1. `parse_cli()` - parse the raw arguments with clap;
//! 2. `Cli::validate()` - cross-field validation producing a
//!    [`ValidatedCli`] the application layer can trust.
//!
//! The surface of the batch entry point:
//!
//! - `--db-path PATH` (default `unified_storage.sqlite`)
//! - `--log-level {DEBUG,INFO,WARNING,ERROR}`
//! - `--start-scheduler`
//! - `--config-file PATH`
//! - `--batch-mode`
//! - `--input-files PATH...`

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Log levels accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliLogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl CliLogLevel {
    /// Filter directive for the tracing subscriber.
    pub fn as_filter(self) -> &'static str {
        match self {
            CliLogLevel::Debug => "debug",
            CliLogLevel::Info => "info",
            CliLogLevel::Warning => "warn",
            CliLogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CliLogLevel::Debug => "DEBUG",
            CliLogLevel::Info => "INFO",
            CliLogLevel::Warning => "WARNING",
            CliLogLevel::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}

/// Raw command-line arguments of the batch entry point.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "text_etl",
    about = "Document processing ETL engine",
    version
)]
pub struct Cli {
    /// Path to the metadata database file
    #[arg(long, default_value = "unified_storage.sqlite")]
    pub db_path: PathBuf,

    /// Logging level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    pub log_level: CliLogLevel,

    /// Start the background scheduler service
    #[arg(long)]
    pub start_scheduler: bool,

    /// Path to a pipeline configuration file (JSON)
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Run in batch mode (no interactive frontend)
    #[arg(long)]
    pub batch_mode: bool,

    /// Input files for batch processing
    #[arg(long, num_args = 0..)]
    pub input_files: Vec<PathBuf>,
}

impl Cli {
    /// Cross-field validation.
    ///
    /// Batch mode requires input files; a configured pipeline file must
    /// exist. Missing individual input files are reported later per file so
    /// one bad path does not abort the whole batch.
    pub fn validate(self) -> Result<ValidatedCli, String> {
        if self.batch_mode && self.input_files.is_empty() {
            return Err("--input-files is required in batch mode".to_string());
        }
        if let Some(config) = &self.config_file {
            if !config.exists() {
                return Err(format!("config file not found: {}", config.display()));
            }
        }
        Ok(ValidatedCli {
            db_path: self.db_path,
            log_level: self.log_level,
            start_scheduler: self.start_scheduler,
            config_file: self.config_file,
            batch_mode: self.batch_mode,
            input_files: self.input_files,
        })
    }
}

/// CLI arguments after validation.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub db_path: PathBuf,
    pub log_level: CliLogLevel,
    pub start_scheduler: bool,
    pub config_file: Option<PathBuf>,
    pub batch_mode: bool,
    pub input_files: Vec<PathBuf>,
}

/// Parses the process arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}
