// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain entities: chunks with provenance, structured documents, pipeline
//! configurations, pipeline runs, and stored user scripts.

pub mod chunk;
pub mod document;
pub mod pipeline;
pub mod pipeline_run;
pub mod script;

pub use chunk::{Chunk, ChunkRecord, ChunkType, Metadata};
pub use document::{Block, Document, DocumentFormat, FontFlags, Page, Section, TextSpan};
pub use pipeline::{PipelineConfig, StepConfig, StepKind};
pub use pipeline_run::{PipelineRun, RunError, RunStatus};
pub use script::ScriptRecord;
