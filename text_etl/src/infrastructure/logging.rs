// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tracing Setup
//!
//! Installs the global tracing subscriber with an `EnvFilter` derived from
//! the CLI's `--log-level` (overridable through `RUST_LOG`). Operational
//! events are additionally persisted via the metadata store's log
//! repository; this module only covers the console side.

use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. Safe to call more than once; later
/// calls are no-ops (relevant under `cargo test`).
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
