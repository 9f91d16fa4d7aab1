// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Proxy and browser configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::DEFAULT_BLOCKLIST;

/// Default viewport width in CSS pixels
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1024;
/// Default viewport height in CSS pixels
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 768;

/// Page viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }
}

impl Viewport {
    /// Create a viewport with explicit dimensions
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Chrome launch configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Path to a custom Chrome/Chromium executable
    pub executable: Option<PathBuf>,
    /// Additional command-line arguments appended to the fixed flag set
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            extra_args: vec![],
        }
    }
}

impl BrowserConfig {
    /// Create a new browser config
    pub fn new() -> Self {
        Self::default()
    }

    /// Run with a visible window (devtools auto-open)
    pub fn headful(mut self) -> Self {
        self.headless = false;
        self
    }

    /// Use a custom Chrome executable
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Append an extra launch argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }
}

/// Rendering proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Maximum number of cached sessions
    pub cache_capacity: usize,
    /// How long an idle session stays cached
    pub cache_ttl: Duration,
    /// Interval of the active cache sweep
    pub prune_interval: Duration,
    /// Viewport applied when the request specifies none
    pub default_viewport: Viewport,
    /// Hard ceiling on elapsed time before sub-resource requests abort
    pub max_request_elapsed: Duration,
    /// Hard ceiling on the number of allowed sub-resource requests
    pub max_request_count: u32,
    /// Default time box for screenshot/render/pdf actions
    pub default_action_timeout: Duration,
    /// Quiet period after the load event before navigation counts as settled
    pub network_quiet_delay: Duration,
    /// Time box for the content-type preflight HEAD request
    pub preflight_timeout: Duration,
    /// Blocklist fragments, combined into one case-insensitive matcher
    pub blocklist: Vec<String>,
    /// Chrome launch settings
    pub browser: BrowserConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 20,
            cache_ttl: Duration::from_secs(60),
            prune_interval: Duration::from_secs(60),
            default_viewport: Viewport::default(),
            max_request_elapsed: Duration::from_secs(15),
            max_request_count: 100,
            default_action_timeout: Duration::from_secs(10),
            network_quiet_delay: Duration::from_millis(500),
            preflight_timeout: Duration::from_secs(5),
            blocklist: DEFAULT_BLOCKLIST.iter().map(|s| s.to_string()).collect(),
            browser: BrowserConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Create a new proxy config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the session cache TTL
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the default action timeout
    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.default_action_timeout = timeout;
        self
    }

    /// Replace the blocklist fragments
    pub fn blocklist(mut self, patterns: Vec<String>) -> Self {
        self.blocklist = patterns;
        self
    }

    /// Set the Chrome launch settings
    pub fn browser(mut self, browser: BrowserConfig) -> Self {
        self.browser = browser;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_viewport() {
        let viewport = Viewport::default();
        assert_eq!(viewport.width, 1024);
        assert_eq!(viewport.height, 768);
    }

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.cache_capacity, 20);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.max_request_count, 100);
        assert_eq!(config.max_request_elapsed, Duration::from_secs(15));
        assert_eq!(config.default_action_timeout, Duration::from_secs(10));
        assert!(!config.blocklist.is_empty());
    }

    #[test]
    fn test_builder_chain() {
        let config = ProxyConfig::new()
            .cache_capacity(5)
            .action_timeout(Duration::from_secs(30))
            .browser(BrowserConfig::new().headful().arg("--lang=fi"));

        assert_eq!(config.cache_capacity, 5);
        assert_eq!(config.default_action_timeout, Duration::from_secs(30));
        assert!(!config.browser.headless);
        assert_eq!(config.browser.extra_args, vec!["--lang=fi".to_string()]);
    }
}
