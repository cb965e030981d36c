// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Architecture Compliance Test
//!
//! Source-level checks that the layering holds: the domain crate stays
//! free of runtime, database, and logging dependencies, and no back edges
//! exist from the domain into the application or infrastructure layers.

use std::path::{Path, PathBuf};

fn domain_src() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("workspace root")
        .join("text_etl_domain")
        .join("src")
}

fn rust_sources(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).expect("readable source dir") {
            let entry = entry.expect("dir entry");
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Strips `#[cfg(test)] mod tests { ... }` blocks so dev-only imports do
/// not count against the production-code rules.
fn production_code(source: &str) -> String {
    match source.find("#[cfg(test)]") {
        Some(index) => source[..index].to_string(),
        None => source.to_string(),
    }
}

#[test]
fn test_domain_has_no_infrastructure_dependencies() {
    let forbidden = ["tokio::", "sqlx", "tracing", "anyhow", "mongodb", "sysinfo"];
    for file in rust_sources(&domain_src()) {
        let source = production_code(&std::fs::read_to_string(&file).expect("readable source"));
        for needle in forbidden {
            assert!(
                !source.contains(&format!("use {}", needle)),
                "{} must not depend on {}",
                file.display(),
                needle
            );
        }
    }
}

#[test]
fn test_domain_has_no_back_edges() {
    for file in rust_sources(&domain_src()) {
        let source = production_code(&std::fs::read_to_string(&file).expect("readable source"));
        assert!(
            !source.contains("use text_etl::") && !source.contains("use text_etl_bootstrap::"),
            "{} must not import upper layers",
            file.display()
        );
    }
}

#[test]
fn test_domain_propagates_errors_without_unwrap() {
    // Production code in the domain returns Result; unwrap/expect stay in
    // tests. Statically compiled patterns are the accepted exception.
    for file in rust_sources(&domain_src()) {
        let source = production_code(&std::fs::read_to_string(&file).expect("readable source"));
        for (number, line) in source.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("//") || trimmed.contains("expect(\"") {
                continue;
            }
            assert!(
                !trimmed.contains(".unwrap()"),
                "{}:{} uses unwrap in production code",
                file.display(),
                number + 1
            );
        }
    }
}
