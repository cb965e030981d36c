// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metadata Store
//!
//! One embedded SQLite database holding pipelines, runs, scripts, target
//! connections, chunks, logs, and the changelog. All mutating statements
//! are serialized behind a mutex; reads are lock-free.

pub mod metadata_store;
pub mod schema;

pub use metadata_store::SqliteMetadataStore;
