// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Text ETL Domain Layer
//!
//! Pure business logic for the document-processing ETL engine. This crate
//! contains the entities, value objects, domain services, and infrastructure
//! ports that the application and infrastructure layers build upon.
//!
//! ## Architecture
//!
//! The domain layer follows Domain-Driven Design principles and has no
//! dependency on the async runtime, the database driver, or the logging
//! backend:
//!
//! - **Entities** (`entities`): `Chunk`, `Document`, `PipelineConfig`,
//!   `PipelineRun`, `ScriptRecord` - objects with identity and lifecycle.
//! - **Value Objects** (`value_objects`): typed identifiers, cron schedules,
//!   header style rules - immutable and compared by value.
//! - **Domain Services** (`services`): the style-based header detector, the
//!   error-recovery classifier, checksum helpers, and the ports that
//!   infrastructure adapters implement (loaders, processors, exporters).
//! - **Repositories** (`repositories`): persistence ports for the metadata
//!   store.
//!
//! ## Dependency Direction
//!
//! The domain is a leaf: processors depend on the domain, the pipeline
//! manager depends on processors, and the scheduler depends on the manager.
//! No back edges exist from the domain into upper layers.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export core types for convenient access
pub use entities::chunk::{Chunk, ChunkRecord, ChunkType, Metadata};
pub use entities::document::{
    Block, Document, DocumentFormat, FontFlags, Page, Section, TextSpan,
};
pub use entities::pipeline::{PipelineConfig, StepConfig, StepKind};
pub use entities::pipeline_run::{PipelineRun, RunError, RunStatus};
pub use entities::script::ScriptRecord;
pub use error::EtlError;
pub use value_objects::cron_schedule::CronSchedule;
pub use value_objects::header_rules::{ExactHeadingRule, HeaderFilter, HeaderStyleDefinition};
pub use value_objects::ids::{PipelineId, RunId, ScriptId};
