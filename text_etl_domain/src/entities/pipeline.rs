// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Configuration Entity
//!
//! A `PipelineConfig` is a directed acyclic graph over [`StepConfig`]
//! nodes. Each step names a [`StepKind`] out of the closed kind set, a
//! kind-specific parameter object, and its input wiring: either
//! `input_step_id` (take the output of one earlier step) or an explicit
//! `depends_on` list - never both.
//!
//! ## Validation
//!
//! [`PipelineConfig::validation_errors`] enumerates every violation so the
//! caller can present a complete report:
//!
//! - empty name,
//! - no steps,
//! - `input_step_id` / `depends_on` references that do not resolve,
//! - kind-specific required parameters missing (document loader requires
//!   `source_path` or `document_paths`; user script requires `script_id`;
//!   DB exporter requires `table_name`; file/JSON exporter requires
//!   `output_path`),
//! - dependency cycles,
//! - malformed cron schedule.
//!
//! ## Lifecycle
//!
//! Configurations are created, updated (version increases monotonically),
//! and soft-deleted; the pipeline manager refuses updates and deletes while
//! a run for the pipeline is active.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EtlError;
use crate::value_objects::cron_schedule::CronSchedule;
use crate::value_objects::ids::PipelineId;

/// Closed set of typed pipeline step kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    DocumentLoader,
    LineSplitter,
    DelimiterSplitter,
    ParagraphSplitter,
    SentenceSplitter,
    RegexExtractor,
    UserScript,
    MetadataPropagator,
    DbExporter,
    FileExporter,
    JsonExporter,
}

impl StepKind {
    /// Whether the step consumes and re-emits its input unchanged
    /// (exporters are side-effect only).
    pub fn is_exporter(self) -> bool {
        matches!(
            self,
            StepKind::DbExporter | StepKind::FileExporter | StepKind::JsonExporter
        )
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::DocumentLoader => "document_loader",
            StepKind::LineSplitter => "line_splitter",
            StepKind::DelimiterSplitter => "delimiter_splitter",
            StepKind::ParagraphSplitter => "paragraph_splitter",
            StepKind::SentenceSplitter => "sentence_splitter",
            StepKind::RegexExtractor => "regex_extractor",
            StepKind::UserScript => "user_script",
            StepKind::MetadataPropagator => "metadata_propagator",
            StepKind::DbExporter => "db_exporter",
            StepKind::FileExporter => "file_exporter",
            StepKind::JsonExporter => "json_exporter",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for StepKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "document_loader" => Ok(StepKind::DocumentLoader),
            "line_splitter" => Ok(StepKind::LineSplitter),
            "delimiter_splitter" => Ok(StepKind::DelimiterSplitter),
            "paragraph_splitter" => Ok(StepKind::ParagraphSplitter),
            "sentence_splitter" => Ok(StepKind::SentenceSplitter),
            "regex_extractor" => Ok(StepKind::RegexExtractor),
            "user_script" => Ok(StepKind::UserScript),
            "metadata_propagator" => Ok(StepKind::MetadataPropagator),
            "db_exporter" => Ok(StepKind::DbExporter),
            "file_exporter" => Ok(StepKind::FileExporter),
            "json_exporter" => Ok(StepKind::JsonExporter),
            other => Err(EtlError::InvalidConfiguration(format!(
                "unknown step kind: {}",
                other
            ))),
        }
    }
}

/// One node of the pipeline graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(default = "StepConfig::generate_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_params")]
    pub params: Value,
    #[serde(default)]
    pub input_step_id: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

fn default_params() -> Value {
    Value::Object(serde_json::Map::new())
}

impl StepConfig {
    fn generate_id() -> String {
        let short: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        format!("step_{}", short)
    }

    pub fn new(kind: StepKind, name: impl Into<String>) -> Self {
        Self {
            id: Self::generate_id(),
            kind,
            name: name.into(),
            params: default_params(),
            input_step_id: None,
            depends_on: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_input(mut self, step_id: impl Into<String>) -> Self {
        self.input_step_id = Some(step_id.into());
        self
    }

    /// Fetches a string parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Fetches a boolean parameter, defaulting to `false`.
    pub fn param_bool(&self, key: &str) -> bool {
        self.params.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Whether failures of this step should not abort the document.
    pub fn is_optional(&self) -> bool {
        self.param_bool("optional")
    }
}

/// A named, versioned DAG of processing steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "PipelineId::new")]
    pub id: PipelineId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StepConfig>,
    /// Optional cron expression, validated as part of `validation_errors`.
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default = "default_params")]
    pub source_config: Value,
    #[serde(default = "default_params")]
    pub target_config: Value,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>, steps: Vec<StepConfig>) -> Self {
        let now = Utc::now();
        Self {
            id: PipelineId::new(),
            name: name.into(),
            description: String::new(),
            steps,
            schedule: None,
            source_config: default_params(),
            target_config: default_params(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn step_by_id(&self, step_id: &str) -> Option<&StepConfig> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Marks the configuration as updated: bumps the version and refreshes
    /// the timestamp.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Complete ordered list of validation failures; empty means valid.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("pipeline name cannot be empty".to_string());
        }
        if self.steps.is_empty() {
            errors.push("pipeline must have at least one step".to_string());
        }

        let step_ids: HashSet<&str> = self.steps.iter().map(|s| s.id.as_str()).collect();

        for (index, step) in self.steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                errors.push(format!("step {} has no id", index + 1));
            }
            if step.input_step_id.is_some() && !step.depends_on.is_empty() {
                errors.push(format!(
                    "step {} sets both input_step_id and depends_on",
                    step.id
                ));
            }
            if let Some(input_id) = &step.input_step_id {
                if !step_ids.contains(input_id.as_str()) {
                    errors.push(format!(
                        "step {} references non-existent input step: {}",
                        step.id, input_id
                    ));
                }
            }
            for dep in &step.depends_on {
                if !step_ids.contains(dep.as_str()) {
                    errors.push(format!(
                        "step {} depends on non-existent step: {}",
                        step.id, dep
                    ));
                }
            }
            errors.extend(self.step_param_errors(step));
        }

        if self.has_cycle() {
            errors.push("pipeline steps form a cycle".to_string());
        }

        if let Some(schedule) = &self.schedule {
            if !schedule.trim().is_empty() {
                if let Err(err) = CronSchedule::parse(schedule) {
                    errors.push(format!("invalid schedule: {}", err));
                }
            }
        }

        errors
    }

    fn step_param_errors(&self, step: &StepConfig) -> Vec<String> {
        let mut errors = Vec::new();
        match step.kind {
            StepKind::DocumentLoader => {
                let has_source = step.param_str("source_path").is_some();
                let has_paths = step
                    .params
                    .get("document_paths")
                    .and_then(Value::as_array)
                    .map(|a| !a.is_empty())
                    .unwrap_or(false);
                if !has_source && !has_paths {
                    errors.push(format!(
                        "document loader step {} requires 'source_path' or 'document_paths'",
                        step.id
                    ));
                }
            }
            StepKind::UserScript => {
                if step.param_str("script_id").is_none() {
                    errors.push(format!("script step {} requires 'script_id'", step.id));
                }
            }
            StepKind::DbExporter => {
                if step.param_str("table_name").is_none() {
                    errors.push(format!("db exporter step {} requires 'table_name'", step.id));
                }
            }
            StepKind::FileExporter | StepKind::JsonExporter => {
                if step.param_str("output_path").is_none() {
                    errors.push(format!(
                        "{} step {} requires 'output_path'",
                        step.kind, step.id
                    ));
                }
            }
            _ => {}
        }
        errors
    }

    /// Cycle detection over the union of `input_step_id` and `depends_on`
    /// edges.
    fn has_cycle(&self) -> bool {
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
        for step in &self.steps {
            let entry = edges.entry(step.id.as_str()).or_default();
            if let Some(input) = &step.input_step_id {
                entry.push(input.as_str());
            }
            for dep in &step.depends_on {
                entry.push(dep.as_str());
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks: HashMap<&str, Mark> =
            self.steps.iter().map(|s| (s.id.as_str(), Mark::Unvisited)).collect();

        fn visit<'a>(
            node: &'a str,
            edges: &HashMap<&'a str, Vec<&'a str>>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> bool {
            match marks.get(node).copied() {
                Some(Mark::Done) | None => return false,
                Some(Mark::InProgress) => return true,
                Some(Mark::Unvisited) => {}
            }
            marks.insert(node, Mark::InProgress);
            if let Some(targets) = edges.get(node) {
                for target in targets {
                    if visit(target, edges, marks) {
                        return true;
                    }
                }
            }
            marks.insert(node, Mark::Done);
            false
        }

        let ids: Vec<&str> = self.steps.iter().map(|s| s.id.as_str()).collect();
        ids.into_iter().any(|id| visit(id, &edges, &mut marks))
    }

    /// Validates, turning the first batch of failures into an error.
    pub fn validate(&self) -> Result<(), EtlError> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EtlError::InvalidConfiguration(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loader_step() -> StepConfig {
        StepConfig::new(StepKind::DocumentLoader, "load")
            .with_id("load")
            .with_params(json!({"source_path": "/tmp"}))
    }

    #[test]
    fn test_step_kind_round_trip() {
        for kind in [
            StepKind::DocumentLoader,
            StepKind::LineSplitter,
            StepKind::DelimiterSplitter,
            StepKind::ParagraphSplitter,
            StepKind::SentenceSplitter,
            StepKind::RegexExtractor,
            StepKind::UserScript,
            StepKind::MetadataPropagator,
            StepKind::DbExporter,
            StepKind::FileExporter,
            StepKind::JsonExporter,
        ] {
            let parsed: StepKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("word_counter".parse::<StepKind>().is_err());
    }

    #[test]
    fn test_valid_pipeline_passes() {
        let split = StepConfig::new(StepKind::LineSplitter, "split")
            .with_id("split")
            .with_input("load");
        let config = PipelineConfig::new("demo", vec![loader_step(), split]);
        assert!(config.validation_errors().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_name_and_steps_fail() {
        let config = PipelineConfig::new("  ", vec![]);
        let errors = config.validation_errors();
        assert!(errors.iter().any(|e| e.contains("name")));
        assert!(errors.iter().any(|e| e.contains("at least one step")));
    }

    #[test]
    fn test_unresolved_references_fail() {
        let split = StepConfig::new(StepKind::LineSplitter, "split")
            .with_id("split")
            .with_input("missing");
        let config = PipelineConfig::new("demo", vec![loader_step(), split]);
        assert!(config
            .validation_errors()
            .iter()
            .any(|e| e.contains("non-existent input step")));
    }

    #[test]
    fn test_input_and_depends_on_are_exclusive() {
        let mut step = StepConfig::new(StepKind::LineSplitter, "split")
            .with_id("split")
            .with_input("load");
        step.depends_on.push("load".to_string());
        let config = PipelineConfig::new("demo", vec![loader_step(), step]);
        assert!(config
            .validation_errors()
            .iter()
            .any(|e| e.contains("both input_step_id and depends_on")));
    }

    #[test]
    fn test_kind_specific_params_required() {
        let steps = vec![
            StepConfig::new(StepKind::DocumentLoader, "load").with_id("load"),
            StepConfig::new(StepKind::UserScript, "script").with_id("script"),
            StepConfig::new(StepKind::DbExporter, "db").with_id("db"),
            StepConfig::new(StepKind::JsonExporter, "json").with_id("json"),
        ];
        let errors = PipelineConfig::new("demo", steps).validation_errors();
        assert!(errors.iter().any(|e| e.contains("source_path")));
        assert!(errors.iter().any(|e| e.contains("script_id")));
        assert!(errors.iter().any(|e| e.contains("table_name")));
        assert!(errors.iter().any(|e| e.contains("output_path")));
    }

    #[test]
    fn test_cycle_detection() {
        let a = StepConfig::new(StepKind::LineSplitter, "a").with_id("a").with_input("b");
        let b = StepConfig::new(StepKind::LineSplitter, "b").with_id("b").with_input("a");
        let config = PipelineConfig::new("demo", vec![a, b]);
        assert!(config.validation_errors().iter().any(|e| e.contains("cycle")));
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let mut config = PipelineConfig::new("demo", vec![loader_step()]);
        config.schedule = Some("0 61 * * *".to_string());
        assert!(config.validation_errors().iter().any(|e| e.contains("schedule")));

        config.schedule = Some("0 2 * * *".to_string());
        assert!(config.validation_errors().is_empty());
    }

    #[test]
    fn test_touch_bumps_version() {
        let mut config = PipelineConfig::new("demo", vec![loader_step()]);
        assert_eq!(config.version, 1);
        config.touch();
        assert_eq!(config.version, 2);
    }

    #[test]
    fn test_serde_round_trip_preserves_ids_and_order() {
        let split = StepConfig::new(StepKind::LineSplitter, "split")
            .with_id("split")
            .with_input("load");
        let export = StepConfig::new(StepKind::JsonExporter, "export")
            .with_id("export")
            .with_params(json!({"output_path": "./out"}))
            .with_input("split");
        let config = PipelineConfig::new("demo", vec![loader_step(), split, export]);

        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, config.id);
        let ids: Vec<&str> = back.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["load", "split", "export"]);
    }

    #[test]
    fn test_config_file_shape_deserializes() {
        // External config-file layout: {name, description, steps, schedule, ...}
        let raw = json!({
            "name": "pdf_pipeline",
            "description": "demo",
            "steps": [
                {"id": "load", "type": "document_loader", "name": "Load",
                 "params": {"source_path": "/data"}},
                {"id": "split", "type": "line_splitter", "name": "Split",
                 "input_step_id": "load"}
            ],
            "schedule": "0 2 * * *",
            "version": 3
        });
        let config: PipelineConfig = serde_json::from_value(raw).unwrap();
        assert_eq!(config.steps.len(), 2);
        assert_eq!(config.steps[1].kind, StepKind::LineSplitter);
        assert_eq!(config.version, 3);
        assert!(config.validation_errors().is_empty());
    }
}
