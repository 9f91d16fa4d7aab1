// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Static URL blocklist
//!
//! Tracker and analytics endpoints contribute nothing to a rendered
//! artifact, so their requests are aborted outright. The configured
//! fragments are treated as regex fragments and combined into a single
//! case-insensitive matcher, evaluated once per sub-resource request.

use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};

/// Default tracker/analytics fragments
pub const DEFAULT_BLOCKLIST: &[&str] = &[
    "google-analytics\\.com",
    "googletagmanager\\.com",
    "googletagservices\\.com",
    "googlesyndication\\.com",
    "doubleclick\\.net",
    "adservice\\.google\\.",
    "amazon-adsystem\\.com",
    "facebook\\.com/tr",
    "connect\\.facebook\\.net",
    "scorecardresearch\\.com",
    "quantserve\\.com",
    "hotjar\\.com",
    "segment\\.(io|com)",
    "mixpanel\\.com",
    "optimizely\\.com",
    "newrelic\\.com",
    "nr-data\\.net",
    "chartbeat\\.com",
    "krxd\\.net",
    "outbrain\\.com",
    "taboola\\.com",
    "addthis\\.com",
    "sharethis\\.com",
];

/// One compiled case-insensitive matcher over all fragments
#[derive(Debug, Clone)]
pub struct Blocklist {
    pattern: Regex,
}

impl Blocklist {
    /// Compile a blocklist from regex fragments
    pub fn new<S: AsRef<str>>(fragments: &[S]) -> Result<Self> {
        let joined = fragments
            .iter()
            .map(|f| f.as_ref())
            .collect::<Vec<_>>()
            .join("|");
        // An empty alternation matches everything; map no-fragments to
        // a matcher that can never match instead.
        let source = if joined.is_empty() {
            "$^".to_string()
        } else {
            format!("({})", joined)
        };
        let pattern = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::config(format!("invalid blocklist pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Compile the default tracker/analytics blocklist
    pub fn default_patterns() -> Self {
        // The built-in fragments are known-good.
        Self::new(DEFAULT_BLOCKLIST).expect("default blocklist compiles")
    }

    /// Check whether a URL matches any fragment
    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blocklist_matches_trackers() {
        let blocklist = Blocklist::default_patterns();
        assert!(blocklist.matches("https://www.google-analytics.com/collect?v=1"));
        assert!(blocklist.matches("https://static.hotjar.com/c/hotjar.js"));
        assert!(blocklist.matches("HTTPS://CDN.SEGMENT.COM/analytics.js"));
    }

    #[test]
    fn test_default_blocklist_passes_content() {
        let blocklist = Blocklist::default_patterns();
        assert!(!blocklist.matches("https://example.com/styles/main.css"));
        assert!(!blocklist.matches("https://cdn.example.net/app.js"));
    }

    #[test]
    fn test_empty_blocklist_never_matches() {
        let blocklist = Blocklist::new::<&str>(&[]).unwrap();
        assert!(!blocklist.matches("https://example.com/"));
        assert!(!blocklist.matches(""));
    }

    #[test]
    fn test_custom_fragments() {
        let blocklist = Blocklist::new(&["evil\\.example", "beacons?/"]).unwrap();
        assert!(blocklist.matches("https://evil.example/payload.js"));
        assert!(blocklist.matches("https://cdn.example.com/beacon/ping"));
        assert!(!blocklist.matches("https://good.example/app.js"));
    }

    #[test]
    fn test_invalid_fragment_is_rejected() {
        assert!(Blocklist::new(&["(unclosed"]).is_err());
    }
}
