// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser lifecycle management
//!
//! Process-wide there is zero or one running Chrome instance. It is
//! launched lazily on the first cache miss and torn down when a request
//! observes a fatal transport failure, so the next request relaunches a
//! fresh engine. Launch is never retried automatically.

use std::sync::Arc;

use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::BrowserConfig;
use crate::error::{Error, Result};

/// Sandbox flags passed on every launch
const LAUNCH_ARGS: &[&str] = &["--no-sandbox", "--disable-setuid-sandbox"];

/// Flag added in headful mode
const DEVTOOLS_ARG: &str = "--auto-open-devtools-for-tabs";

struct HostState {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

/// Owner of the process-wide Chrome singleton
pub struct BrowserHost {
    config: BrowserConfig,
    state: Mutex<Option<HostState>>,
}

impl BrowserHost {
    /// Create a host; no browser is launched until [`ensure`](Self::ensure)
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
        }
    }

    /// Return the running browser, launching one if none exists.
    ///
    /// A launch failure propagates to the caller as a fatal request
    /// error; nothing is retried here.
    pub async fn ensure(&self) -> Result<Arc<Browser>> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.as_ref() {
            return Ok(existing.browser.clone());
        }

        info!("launching browser");
        let launch = build_launch_config(&self.config)?;
        let (browser, mut handler) = Browser::launch(launch)
            .await
            .map_err(|e| Error::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if let Err(e) = result {
                    debug!(error = %e, "browser handler event error");
                }
            }
            debug!("browser handler loop ended");
        });

        let browser = Arc::new(browser);
        *state = Some(HostState {
            browser: browser.clone(),
            handler: handler_task,
        });
        Ok(browser)
    }

    /// Tear down the singleton so the next request relaunches.
    ///
    /// Idempotent; close failures are logged and ignored.
    pub async fn kill(&self) {
        let taken = self.state.lock().await.take();
        let Some(state) = taken else {
            return;
        };

        error!("browser control channel failed; killing instance");
        match Arc::try_unwrap(state.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    warn!(error = %e, "browser could not be closed cleanly");
                }
                if let Err(e) = browser.wait().await {
                    warn!(error = %e, "browser process did not exit cleanly");
                }
            }
            Err(_) => {
                // Live pages still hold references; dropping ours lets the
                // process be reaped once they are destroyed.
                warn!("browser still referenced by live sessions; deferring process reap");
            }
        }
        state.handler.abort();
    }

    /// Whether a browser instance is currently running
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }
}

/// Assemble the full launch argument list for a config
fn launch_args(config: &BrowserConfig) -> Vec<String> {
    let mut args: Vec<String> = LAUNCH_ARGS.iter().map(|a| a.to_string()).collect();
    if !config.headless {
        args.push(DEVTOOLS_ARG.to_string());
    }
    args.extend(config.extra_args.iter().cloned());
    args
}

fn build_launch_config(config: &BrowserConfig) -> Result<LaunchConfig> {
    let mut builder = LaunchConfig::builder().args(launch_args(config));
    if !config.headless {
        builder = builder.with_head();
    }
    if let Some(path) = &config.executable {
        builder = builder.chrome_executable(path);
    }
    builder.build().map_err(Error::Launch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_include_sandbox_flags() {
        let args = launch_args(&BrowserConfig::default());
        assert!(args.iter().any(|a| a == "--no-sandbox"));
        assert!(args.iter().any(|a| a == "--disable-setuid-sandbox"));
        assert!(!args.iter().any(|a| a == DEVTOOLS_ARG));
    }

    #[test]
    fn test_headful_adds_devtools_flag() {
        let args = launch_args(&BrowserConfig::new().headful());
        assert!(args.iter().any(|a| a == DEVTOOLS_ARG));
    }

    #[test]
    fn test_extra_args_are_appended() {
        let args = launch_args(&BrowserConfig::new().arg("--lang=fi"));
        assert_eq!(args.last().map(String::as_str), Some("--lang=fi"));
    }

    #[tokio::test]
    async fn test_kill_is_idempotent_without_browser() {
        let host = BrowserHost::new(BrowserConfig::default());
        assert!(!host.is_running().await);
        host.kill().await;
        host.kill().await;
        assert!(!host.is_running().await);
    }
}
