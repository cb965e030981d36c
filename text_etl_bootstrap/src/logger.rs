// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Logger
//!
//! Lightweight logging abstraction for the bootstrap phase, before the
//! application's tracing subscriber is installed.
//!
//! - **Minimal API** - only essential log levels
//! - **Trait-based** - testable with a no-op implementation
//! - **Integration-ready** - the console implementation routes through
//!   `tracing` once the subscriber exists

/// Bootstrap logging abstraction
///
/// Provides a simple logging interface for bootstrap operations.
pub trait BootstrapLogger: Send + Sync {
    /// Log an error message (fatal errors during bootstrap).
    fn error(&self, message: &str);

    /// Log a warning message (non-fatal issues).
    fn warn(&self, message: &str);

    /// Log an info message (normal bootstrap progress).
    fn info(&self, message: &str);

    /// Log a debug message (detailed diagnostics).
    fn debug(&self, message: &str);
}

/// Console logger implementation routing through the tracing crate.
pub struct ConsoleLogger {
    prefix: String,
}

impl ConsoleLogger {
    /// Create a new console logger with the default prefix.
    pub fn new() -> Self {
        Self::with_prefix("bootstrap")
    }

    /// Create a console logger with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapLogger for ConsoleLogger {
    fn error(&self, message: &str) {
        tracing::error!("[{}] {}", self.prefix, message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("[{}] {}", self.prefix, message);
    }

    fn info(&self, message: &str) {
        tracing::info!("[{}] {}", self.prefix, message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!("[{}] {}", self.prefix, message);
    }
}

/// No-op logger for tests.
pub struct NoopLogger;

impl BootstrapLogger for NoopLogger {
    fn error(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
}
