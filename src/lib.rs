// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Mustekala - Headless Chrome Rendering Proxy Core
//!
//! Drives one headless Chrome instance over the DevTools protocol and
//! turns web pages into derived artifacts: screenshots, sanitized HTML
//! snapshots, or PDFs. Built for sitting behind a thin HTTP front door.
//!
//! ## Features
//!
//! - Session cache: bounded, TTL-expiring map from page URL to a live
//!   browser page, with ordered best-effort disposal
//! - Request control: per-request traffic filter with time, count and
//!   blocklist ceilings, installed once per session
//! - Guarded navigation: content-type preflight, redirect-loop
//!   detection against the proxy's own host, media pause on settle
//! - Three actions under independent time boxes: screenshot (PNG/JPEG,
//!   selector clip, thumbnails), render (raw or sanitized HTML), PDF
//! - Lazy browser lifecycle: one Chrome for the whole process,
//!   relaunched after fatal control-channel failures
//!
//! ## Example
//!
//! ```rust,no_run
//! use mustekala::{Action, ProxyConfig, RenderRequest, RenderService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RenderService::new(ProxyConfig::default())?;
//!
//!     let request = RenderRequest::new(Action::Screenshot, "https://example.com");
//!     let response = service.handle(request).await;
//!
//!     assert_eq!(response.status_code, 200);
//!     println!("{} bytes of {}", response.body.len(), response.content_type);
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod browser;
pub mod cache;
pub mod config;
pub mod error;
pub mod network;
pub mod service;

// Re-exports for convenience

// Service boundary
pub use service::{Action, RenderRequest, RenderResponse, RenderService, StatusSnapshot};

// Configuration
pub use config::{BrowserConfig, ProxyConfig, Viewport};

// Browser control
pub use browser::{BrowserHost, NavigationSpec, Session};

// Session cache
pub use cache::{Dispose, SessionCache};

// Request filtering
pub use network::{
    AbortReason, Blocklist, FilterVerdict, RequestEvent, RequestFilter, ResourceType,
};

// Actions
pub use actions::{ImageType, PaperFormat, PdfOptions, RenderOptions, ScreenshotOptions};

// Errors
pub use error::{Error, Result};

/// Mustekala version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
