// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for the Mustekala rendering proxy
//!
//! Every failure is recovered at the request boundary and converted into
//! a plain-text 400 response. The variants mirror the failure taxonomy:
//! input validation, preflight rejection, navigation failure, action
//! failure/timeout, and fatal browser-transport errors.

use thiserror::Error;

/// Result type alias for Mustekala operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message fragments that identify a dead browser control channel.
///
/// When one of these shows up in a failure, the Chrome instance itself is
/// unusable and must be relaunched, not just the page.
const TRANSPORT_FATAL_SIGNATURES: &[&str] = &[
    "not opened",
    "connection closed",
    "connection reset",
    "channel closed",
    "browser has been closed",
];

/// Main error type for the rendering proxy
#[derive(Error, Debug)]
pub enum Error {
    /// Missing url parameter on the incoming request
    #[error("Missing url parameter")]
    MissingUrl,

    /// URL failed to parse or has a non-http(s) scheme
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Preflight HEAD said the target does not serve HTML
    #[error("Not a HTML page")]
    NotHtml,

    /// Chrome could not be launched
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Navigation failed before the page settled
    #[error("Navigation failed for {url}: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// A response redirected back through the proxy itself
    #[error("Possible infinite redirects detected")]
    RedirectLoop { location: String },

    /// An operation exceeded its time box
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// DevTools protocol failure
    #[error("Browser error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// HTTP preflight failure that must surface (client build etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Image decode/encode failure during thumbnailing
    #[error("Image error: {0}")]
    Image(#[from] image::error::ImageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid-URL error
    pub fn invalid_url<S: Into<String>>(url: S) -> Self {
        Error::InvalidUrl(url.into())
    }

    /// Create a navigation error
    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::NavigationFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a redirect-loop error
    pub fn redirect_loop(location: impl Into<String>) -> Self {
        Error::RedirectLoop {
            location: location.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if this is a redirect-loop classification
    pub fn is_redirect_loop(&self) -> bool {
        matches!(self, Error::RedirectLoop { .. })
    }

    /// Check whether the failure signature means the browser control
    /// channel is gone and the engine instance must be relaunched.
    pub fn is_transport_fatal(&self) -> bool {
        let message = self.to_string().to_ascii_lowercase();
        TRANSPORT_FATAL_SIGNATURES
            .iter()
            .any(|sig| message.contains(sig))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_label() {
        let err = Error::timeout("Render", 10_000);
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Render timed out after 10000ms");
    }

    #[test]
    fn test_redirect_loop_classification() {
        let err = Error::redirect_loop("http://proxy.local/render?url=...");
        assert!(err.is_redirect_loop());
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("infinite redirects"));
    }

    #[test]
    fn test_transport_fatal_signature() {
        let err = Error::other("WebSocket is not opened");
        assert!(err.is_transport_fatal());

        let err = Error::other("Connection Closed by remote");
        assert!(err.is_transport_fatal());

        let err = Error::navigation("https://example.com", "net::ERR_NAME_NOT_RESOLVED");
        assert!(!err.is_transport_fatal());
    }

    #[test]
    fn test_not_html_message() {
        assert_eq!(Error::NotHtml.to_string(), "Not a HTML page");
    }
}
