// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-request allow/abort decisions
//!
//! The filter is a pure function over one observed sub-resource request
//! plus the owning session's progress counters. It is installed once per
//! session (via the CDP Fetch domain) and stays active for the session's
//! whole lifetime, including while the session sits idle in the cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ProxyConfig;
use crate::network::Blocklist;

/// Classified resource type of a sub-resource request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Script,
    Image,
    Font,
    Media,
    Xhr,
    Fetch,
    WebSocket,
    Manifest,
    Other,
}

impl ResourceType {
    /// Non-essential browser chrome that never affects the artifact
    pub fn is_ancillary(self) -> bool {
        matches!(self, ResourceType::Manifest | ResourceType::Other)
    }
}

impl From<chromiumoxide::cdp::browser_protocol::network::ResourceType> for ResourceType {
    fn from(value: chromiumoxide::cdp::browser_protocol::network::ResourceType) -> Self {
        use chromiumoxide::cdp::browser_protocol::network::ResourceType as Cdp;
        match value {
            Cdp::Document => ResourceType::Document,
            Cdp::Stylesheet => ResourceType::Stylesheet,
            Cdp::Script => ResourceType::Script,
            Cdp::Image => ResourceType::Image,
            Cdp::Font => ResourceType::Font,
            Cdp::Media => ResourceType::Media,
            Cdp::Xhr => ResourceType::Xhr,
            Cdp::Fetch => ResourceType::Fetch,
            Cdp::WebSocket => ResourceType::WebSocket,
            Cdp::Manifest => ResourceType::Manifest,
            _ => ResourceType::Other,
        }
    }
}

/// One outgoing sub-resource request observed during interception.
///
/// Ephemeral: built per event from the CDP pause notification and the
/// session counters, never stored.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Classified resource type
    pub resource_type: ResourceType,
    /// Time since navigation started
    pub elapsed: Duration,
    /// Requests allowed so far on this session
    pub request_count: u32,
    /// Whether an action has already completed on this session
    pub action_done: bool,
}

/// Why a request was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Navigation has been running past the hard time ceiling
    Elapsed,
    /// The session spent its request budget
    Budget,
    /// An action already completed; cached sessions stay quiet
    ActionDone,
    /// URL matched the tracker/analytics blocklist
    Blocklisted,
    /// Manifest/other resource type
    Ancillary,
}

/// Outcome of a filter decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Continue the request; the caller increments the session counter
    Allow,
    /// Abort the request; it is not counted
    Abort(AbortReason),
}

/// Pure decision function over request events
#[derive(Debug, Clone)]
pub struct RequestFilter {
    blocklist: Blocklist,
    max_elapsed: Duration,
    max_requests: u32,
}

impl RequestFilter {
    /// Build a filter from explicit limits
    pub fn new(blocklist: Blocklist, max_elapsed: Duration, max_requests: u32) -> Self {
        Self {
            blocklist,
            max_elapsed,
            max_requests,
        }
    }

    /// Build a filter from the proxy configuration
    pub fn from_config(config: &ProxyConfig) -> crate::error::Result<Self> {
        Ok(Self::new(
            Blocklist::new(&config.blocklist)?,
            config.max_request_elapsed,
            config.max_request_count,
        ))
    }

    /// Decide whether one request may proceed.
    ///
    /// Deterministic and side-effect-free for a fixed event tuple; the
    /// only mutation in the protocol is the caller incrementing the
    /// session's request count on `Allow`.
    pub fn decide(&self, event: &RequestEvent) -> FilterVerdict {
        // data: URIs cost nothing and carry no network risk.
        if event
            .url
            .get(..5)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("data:"))
        {
            return FilterVerdict::Allow;
        }

        if event.elapsed > self.max_elapsed {
            return FilterVerdict::Abort(AbortReason::Elapsed);
        }
        if event.request_count > self.max_requests {
            return FilterVerdict::Abort(AbortReason::Budget);
        }
        if event.action_done {
            return FilterVerdict::Abort(AbortReason::ActionDone);
        }

        if self.blocklist.matches(&event.url) {
            return FilterVerdict::Abort(AbortReason::Blocklisted);
        }
        if event.resource_type.is_ancillary() {
            return FilterVerdict::Abort(AbortReason::Ancillary);
        }

        FilterVerdict::Allow
    }
}

/// Shorten a URL for log lines
pub(crate) fn truncate(s: &str, len: usize) -> String {
    if s.chars().count() > len {
        let cut: String = s.chars().take(len).collect();
        format!("{}…", cut)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> RequestFilter {
        RequestFilter::new(
            Blocklist::default_patterns(),
            Duration::from_secs(15),
            100,
        )
    }

    fn event(url: &str) -> RequestEvent {
        RequestEvent {
            url: url.to_string(),
            method: "GET".to_string(),
            resource_type: ResourceType::Script,
            elapsed: Duration::from_secs(1),
            request_count: 3,
            action_done: false,
        }
    }

    #[test]
    fn test_allows_ordinary_request() {
        assert_eq!(
            filter().decide(&event("https://example.com/app.js")),
            FilterVerdict::Allow
        );
    }

    #[test]
    fn test_data_uri_always_allowed() {
        let mut ev = event("data:image/png;base64,iVBORw0KGgo=");
        ev.elapsed = Duration::from_secs(60);
        ev.request_count = 10_000;
        ev.action_done = true;
        assert_eq!(filter().decide(&ev), FilterVerdict::Allow);

        ev.url = "DATA:text/plain,hi".to_string();
        assert_eq!(filter().decide(&ev), FilterVerdict::Allow);
    }

    #[test]
    fn test_elapsed_ceiling() {
        let mut ev = event("https://example.com/slow.js");
        ev.elapsed = Duration::from_secs(16);
        assert_eq!(
            filter().decide(&ev),
            FilterVerdict::Abort(AbortReason::Elapsed)
        );

        ev.elapsed = Duration::from_secs(15);
        assert_eq!(filter().decide(&ev), FilterVerdict::Allow);
    }

    #[test]
    fn test_request_budget() {
        let mut ev = event("https://example.com/n.js");
        ev.request_count = 101;
        assert_eq!(
            filter().decide(&ev),
            FilterVerdict::Abort(AbortReason::Budget)
        );

        ev.request_count = 100;
        assert_eq!(filter().decide(&ev), FilterVerdict::Allow);
    }

    #[test]
    fn test_action_done_freezes_session() {
        let mut ev = event("https://example.com/late.js");
        ev.action_done = true;
        assert_eq!(
            filter().decide(&ev),
            FilterVerdict::Abort(AbortReason::ActionDone)
        );
    }

    #[test]
    fn test_blocklisted_url() {
        assert_eq!(
            filter().decide(&event("https://www.google-analytics.com/ga.js")),
            FilterVerdict::Abort(AbortReason::Blocklisted)
        );
    }

    #[test]
    fn test_ancillary_resource_types() {
        let mut ev = event("https://example.com/site.webmanifest");
        ev.resource_type = ResourceType::Manifest;
        assert_eq!(
            filter().decide(&ev),
            FilterVerdict::Abort(AbortReason::Ancillary)
        );

        ev.resource_type = ResourceType::Other;
        assert_eq!(
            filter().decide(&ev),
            FilterVerdict::Abort(AbortReason::Ancillary)
        );

        ev.resource_type = ResourceType::Image;
        assert_eq!(filter().decide(&ev), FilterVerdict::Allow);
    }

    #[test]
    fn test_determinism() {
        let f = filter();
        let ev = event("https://example.com/same.js");
        let first = f.decide(&ev);
        for _ in 0..10 {
            assert_eq!(f.decide(&ev), first);
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 70), "short");
        let long = "x".repeat(80);
        let cut = truncate(&long, 70);
        assert!(cut.ends_with('…'));
        assert_eq!(cut.chars().count(), 71);
    }
}
