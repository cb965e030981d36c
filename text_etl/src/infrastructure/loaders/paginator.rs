// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Virtual Paginator
//!
//! Formats without physical pages (DOCX, TXT) still need a well-defined
//! `page_num` for downstream components. The paginator groups
//! paragraph-like units into virtual pages either by a fixed unit count
//! (default 50) or by an approximate character budget (default 2750),
//! per the configured [`PaginationPolicy`].

use text_etl_domain::entities::document::{Block, Page, TextSpan};
use text_etl_domain::error::EtlError;
use text_etl_domain::services::document_loader::PaginationPolicy;

/// One paragraph-like unit feeding the paginator.
#[derive(Debug, Clone)]
pub struct ParagraphUnit {
    pub text: String,
    pub style: Option<String>,
    /// Style-bearing span derived from the unit's first run, when known.
    pub span: Option<TextSpan>,
}

impl ParagraphUnit {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
            span: None,
        }
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Groups units into virtual [`Page`]s.
pub struct VirtualPaginator;

impl VirtualPaginator {
    /// Applies the policy. Blank units count toward paragraph-count
    /// grouping but contribute neither raw text nor blocks.
    pub fn paginate(
        units: &[ParagraphUnit],
        policy: PaginationPolicy,
    ) -> Result<Vec<Page>, EtlError> {
        match policy {
            PaginationPolicy::ByParagraphs(per_page) => {
                Self::by_paragraphs(units, per_page.max(1))
            }
            PaginationPolicy::ByCharBudget(budget) => Self::by_chars(units, budget.max(1)),
        }
    }

    fn by_paragraphs(units: &[ParagraphUnit], per_page: usize) -> Result<Vec<Page>, EtlError> {
        let mut pages = Vec::new();
        for (index, group) in units.chunks(per_page).enumerate() {
            pages.push(Self::build_page(index as u32 + 1, group)?);
        }
        if pages.is_empty() {
            pages.push(Page::new(1, "")?);
        }
        Ok(pages)
    }

    fn by_chars(units: &[ParagraphUnit], budget: usize) -> Result<Vec<Page>, EtlError> {
        let mut pages = Vec::new();
        let mut current: Vec<ParagraphUnit> = Vec::new();
        let mut current_chars = 0usize;

        for unit in units {
            let unit_chars = unit.text.chars().count();
            if current_chars + unit_chars > budget && !current.is_empty() {
                pages.push(Self::build_page(pages.len() as u32 + 1, &current)?);
                current.clear();
                current_chars = 0;
            }
            current_chars += unit_chars;
            current.push(unit.clone());
        }
        if !current.is_empty() {
            pages.push(Self::build_page(pages.len() as u32 + 1, &current)?);
        }
        if pages.is_empty() {
            pages.push(Page::new(1, "")?);
        }
        Ok(pages)
    }

    fn build_page(number: u32, group: &[ParagraphUnit]) -> Result<Page, EtlError> {
        let raw_text = group
            .iter()
            .filter(|u| !u.is_blank())
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let blocks = group
            .iter()
            .enumerate()
            .filter(|(_, u)| !u.is_blank())
            .map(|(position, unit)| Block::Paragraph {
                text: unit.text.clone(),
                style: unit.style.clone(),
                spans: unit.span.clone().into_iter().collect(),
                line_number: Some(position as u32 + 1),
            })
            .collect();

        Ok(Page::new(number, raw_text)?.with_blocks(blocks))
    }
}
