// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Page-to-PDF conversion

use std::str::FromStr;

use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use serde::{Deserialize, Serialize};

use super::Artifact;
use crate::browser::Session;
use crate::error::{Error, Result};

/// Fixed margin on all sides, in millimetres
const MARGIN_MM: f64 = 5.0;
const MM_PER_INCH: f64 = 25.4;

/// Paper format (CDP expects dimensions in inches)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperFormat {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
}

impl PaperFormat {
    /// (width, height) in inches, portrait orientation
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            PaperFormat::A3 => (11.69, 16.54),
            PaperFormat::A4 => (8.27, 11.69),
            PaperFormat::A5 => (5.83, 8.27),
            PaperFormat::Letter => (8.5, 11.0),
            PaperFormat::Legal => (8.5, 14.0),
            PaperFormat::Tabloid => (11.0, 17.0),
        }
    }
}

impl FromStr for PaperFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "a3" => Ok(PaperFormat::A3),
            "a4" | "" => Ok(PaperFormat::A4),
            "a5" => Ok(PaperFormat::A5),
            "letter" => Ok(PaperFormat::Letter),
            "legal" => Ok(PaperFormat::Legal),
            "tabloid" => Ok(PaperFormat::Tabloid),
            other => Err(Error::config(format!("unknown paper format: {}", other))),
        }
    }
}

/// PDF options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOptions {
    /// Paper format
    pub format: PaperFormat,
    /// Landscape orientation
    pub landscape: bool,
    /// Page range selection, e.g. "1-3, 5"
    pub page_ranges: Option<String>,
}

fn margin_inches() -> f64 {
    MARGIN_MM / MM_PER_INCH
}

pub(super) async fn capture(session: &Session, opts: &PdfOptions) -> Result<Artifact> {
    let (paper_width, paper_height) = opts.format.dimensions();
    let margin = margin_inches();

    let params = PrintToPdfParams {
        landscape: Some(opts.landscape),
        paper_width: Some(paper_width),
        paper_height: Some(paper_height),
        margin_top: Some(margin),
        margin_bottom: Some(margin),
        margin_left: Some(margin),
        margin_right: Some(margin),
        page_ranges: opts.page_ranges.clone(),
        ..Default::default()
    };

    let bytes = session.page().pdf(params).await?;
    Ok(Artifact {
        content_type: "application/pdf",
        bytes,
    })
}
