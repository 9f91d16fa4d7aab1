// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Output actions
//!
//! A ready session is converted into exactly one artifact: raw image
//! bytes, an HTML document, or PDF bytes. Every action runs under its
//! own caller-overridable time box; exceeding it surfaces a labeled
//! timeout ("Screenshot timed out…") without cancelling the browser-side
//! operation, which the eventual session teardown reaps.

mod pdf;
mod render;
mod screenshot;

use std::time::Duration;

use crate::browser::Session;
use crate::error::{Error, Result};

pub use pdf::{PaperFormat, PdfOptions};
pub use render::RenderOptions;
pub use screenshot::{ImageType, ScreenshotOptions};

/// One produced output artifact
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Response content type
    pub content_type: &'static str,
    /// Raw body bytes
    pub bytes: Vec<u8>,
}

/// A fully specified action to run against a session
#[derive(Debug, Clone)]
pub enum ActionRequest {
    Screenshot(ScreenshotOptions),
    Render(RenderOptions),
    Pdf(PdfOptions),
}

impl ActionRequest {
    /// Label used in timeout messages
    pub fn label(&self) -> &'static str {
        match self {
            ActionRequest::Screenshot(_) => "Screenshot",
            ActionRequest::Render(_) => "Render",
            ActionRequest::Pdf(_) => "PDF",
        }
    }
}

/// Run one action against a session under its time box
pub async fn run(session: &Session, request: &ActionRequest, timeout: Duration) -> Result<Artifact> {
    let work = async {
        match request {
            ActionRequest::Screenshot(opts) => screenshot::capture(session, opts).await,
            ActionRequest::Render(opts) => render::capture(session, opts).await,
            ActionRequest::Pdf(opts) => pdf::capture(session, opts).await,
        }
    };

    tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| Error::timeout(request.label(), timeout.as_millis() as u64))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_labels() {
        assert_eq!(
            ActionRequest::Screenshot(ScreenshotOptions::default()).label(),
            "Screenshot"
        );
        assert_eq!(
            ActionRequest::Render(RenderOptions::default()).label(),
            "Render"
        );
        assert_eq!(ActionRequest::Pdf(PdfOptions::default()).label(), "PDF");
    }
}
