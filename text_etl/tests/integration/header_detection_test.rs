// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Header Detection Integration Test
//!
//! Style-driven section detection through the PDF loader with a canned
//! parser backend, plus the style-config file path.

use std::sync::Arc;

use crate::common::CannedPdfBackend;
use text_etl::infrastructure::config::parse_style_config;
use text_etl::infrastructure::loaders::{PdfLoader, PdfPage};
use text_etl_domain::entities::document::{FontFlags, TextSpan};
use text_etl_domain::services::document_loader::{DocumentLoader, LoadRequest};
use text_etl_domain::services::header_detector::HeaderDetector;
use text_etl_domain::value_objects::header_rules::HeaderStyleDefinition;

fn styled(text: &str, size: f32, bold: bool) -> TextSpan {
    TextSpan::styled(text, size, FontFlags::new(bold, false))
}

/// Two bold sizes map to two levels; regular body text is ignored.
#[tokio::test]
async fn test_two_level_detection_from_span_styles() {
    let backend = CannedPdfBackend::with_pages(vec![PdfPage {
        spans: vec![
            styled("Introduction", 16.0, true),
            styled("1.1 Scope", 14.0, true),
            styled("body", 11.0, false),
        ],
    }]);
    let loader = PdfLoader::new(Arc::new(backend));

    let definitions = vec![
        HeaderStyleDefinition {
            font_size: Some(16.0),
            is_bold: Some(true),
            ..HeaderStyleDefinition::new(1)
        },
        HeaderStyleDefinition {
            font_size: Some(14.0),
            is_bold: Some(true),
            ..HeaderStyleDefinition::new(2)
        },
    ];
    let request = LoadRequest::new("doc.pdf").with_header_styles(definitions);
    let document = loader.load(&request).await.unwrap();

    let sections: Vec<(&str, u32)> = document
        .sections()
        .iter()
        .map(|s| (s.title.as_str(), s.level))
        .collect();
    assert_eq!(sections, vec![("Introduction", 1), ("1.1 Scope", 2)]);
    for section in document.sections() {
        assert_eq!(section.start_page, section.end_page);
    }
}

#[tokio::test]
async fn test_detection_spans_multiple_pages() {
    let backend = CannedPdfBackend::with_pages(vec![
        PdfPage {
            spans: vec![styled("Chapter One", 16.0, true), styled("text", 11.0, false)],
        },
        PdfPage {
            spans: vec![styled("Chapter Two", 16.0, true)],
        },
    ]);
    let loader = PdfLoader::new(Arc::new(backend));
    let request = LoadRequest::new("doc.pdf").with_header_styles(vec![HeaderStyleDefinition {
        font_size: Some(16.0),
        is_bold: Some(true),
        ..HeaderStyleDefinition::new(1)
    }]);

    let document = loader.load(&request).await.unwrap();
    assert_eq!(document.sections().len(), 2);
    assert_eq!(document.sections()[0].start_page, 1);
    assert_eq!(document.sections()[1].start_page, 2);
}

/// The full style-config file shape drives the detector: filters reject
/// admitted styles, exact rules override levels.
#[test]
fn test_style_config_file_drives_detector() {
    let raw = r#"{
        "header_assignments": [
            {
                "level": 1,
                "style": {"font_size": 16.0, "is_bold": true},
                "exclude_words": ["figure", "table"],
                "exact_heading_rules": [
                    {"heading_text": "Appendix", "level": 2}
                ]
            }
        ]
    }"#;
    let definitions = parse_style_config(raw).unwrap();
    let detector = HeaderDetector::new(definitions);

    let bold16 = Some(FontFlags::new(true, false).0);
    assert_eq!(detector.detect_level("Overview", Some(16.0), bold16), Some(1));
    // Filter rejects despite a style match
    assert_eq!(detector.detect_level("Table of figures", Some(16.0), bold16), None);
    // Exact rule wins regardless of style attributes
    assert_eq!(detector.detect_level("Appendix", Some(9.0), Some(0)), Some(2));
    // Non-matching style
    assert_eq!(detector.detect_level("Overview", Some(11.0), Some(0)), None);
}

#[test]
fn test_filter_admission_is_conjunctive() {
    let raw = r#"{
        "header_assignments": [
            {
                "level": 1,
                "style": {"is_bold": true},
                "min_length": 5,
                "starts_with": "chapter",
                "include_regex": "\\d+"
            }
        ]
    }"#;
    let detector = HeaderDetector::new(parse_style_config(raw).unwrap());
    let bold = Some(FontFlags::new(true, false).0);

    // All predicates hold
    assert_eq!(detector.detect_level("Chapter 12", None, bold), Some(1));
    // Each single violated predicate rejects
    assert_eq!(detector.detect_level("Chap 1", None, bold), None);
    assert_eq!(detector.detect_level("Chapter twelve", None, bold), None);
    assert_eq!(detector.detect_level("Chp", None, bold), None);
}
