// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Text ETL
//!
//! A document-processing ETL engine. Heterogeneous documents (PDF, DOCX,
//! TXT) are decomposed into structured text chunks carrying hierarchical
//! context (document -> page -> section -> chunk), optionally enriched by
//! sandboxed user scripts, and emitted to pluggable sinks (SQL and document
//! databases, JSON/CSV/TXT files).
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture with two layers above the domain:
//!
//! - **Application** (`application`): the pipeline manager, per-document
//!   executor, parallel task dispatcher, batch processor, cron scheduler,
//!   error-recovery service, and resource monitor.
//! - **Infrastructure** (`infrastructure`): format loaders, chunk
//!   processors, the script subsystem (static validator, sandbox, encrypted
//!   store), exporters, the SQLite metadata store, and configuration
//!   loading.
//!
//! Control flow: scheduler or user -> pipeline manager -> document executor
//! -> (loaders, processors, scripts, exporters) -> metadata store, with the
//! task dispatcher fanning out over documents and the error-recovery
//! service intercepting failures.

pub mod application;
pub mod infrastructure;
