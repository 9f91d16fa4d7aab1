// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser sessions
//!
//! A session binds one exclusive browser page to the URL it was opened
//! for. Sessions are created on cache miss, mutated by the action
//! dispatcher (viewport, `action_done`) and destroyed on eviction or
//! failure. Destruction order is mandatory: cookies are cleared and
//! listener tasks detached before the page closes, so a dead slot never
//! leaks browser-process resources.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
use chromiumoxide::page::Page;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::Dispose;
use crate::config::Viewport;
use crate::error::{Error, Result};

/// Pauses media elements in the document and all reachable same-origin
/// frames, and disables further buffering.
const PAUSE_MEDIA_SCRIPT: &str = r#"
(() => {
  const visit = (doc) => {
    if (!doc) return;
    doc.querySelectorAll('video, audio').forEach((media) => {
      if (media.pause) media.pause();
      media.preload = 'none';
    });
    doc.querySelectorAll('iframe').forEach((frame) => {
      try { visit(frame.contentDocument); } catch (e) {}
    });
  };
  visit(document);
})()
"#;

/// Stops active execution so a cached session cannot keep working in the
/// background: interval timers cleared, XHR/fetch neutralized, animation
/// frames disabled. Applied to the document and same-origin frames.
const FREEZE_SCRIPT: &str = r#"
(() => {
  const visit = (win) => {
    if (!win) return;
    for (let i = 1; i < 99999; i++) win.clearInterval(i);
    win.XMLHttpRequest.prototype.send = () => {};
    win.fetch = () => new Promise(() => {});
    win.requestAnimationFrame = () => 0;
    win.document.querySelectorAll('iframe').forEach((frame) => {
      try { visit(frame.contentWindow); } catch (e) {}
    });
  };
  visit(window);
})()
"#;

/// Progress counters shared with the request-filter listener task
pub struct SessionState {
    started: Instant,
    request_count: AtomicU32,
    action_done: AtomicBool,
}

impl SessionState {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            request_count: AtomicU32::new(0),
            action_done: AtomicBool::new(false),
        }
    }

    /// Time since the session (and with it, navigation) started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Sub-resource requests allowed so far
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Count one allowed request
    pub fn count_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether an action already completed on this session
    pub fn action_done(&self) -> bool {
        self.action_done.load(Ordering::Relaxed)
    }

    /// Flag the session as post-action; the filter aborts everything after
    pub fn mark_action_done(&self) {
        self.action_done.store(true, Ordering::Relaxed);
    }
}

/// One open browser page bound to a source URL
pub struct Session {
    key: String,
    page: Page,
    state: Arc<SessionState>,
    viewport: RwLock<Viewport>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl Session {
    /// Wrap a freshly opened page
    pub fn new(key: impl Into<String>, page: Page, viewport: Viewport) -> Self {
        Self {
            key: key.into(),
            page,
            state: Arc::new(SessionState::new()),
            viewport: RwLock::new(viewport),
            listeners: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// The cache key: the exact user-supplied URL
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying page handle
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Shared progress counters
    pub fn state(&self) -> Arc<SessionState> {
        self.state.clone()
    }

    /// Current viewport
    pub fn viewport(&self) -> Viewport {
        *self.viewport.read()
    }

    /// Register a listener task so destruction can detach it
    pub fn attach_listener(&self, handle: JoinHandle<()>) {
        self.listeners.lock().push(handle);
    }

    /// Apply a viewport to the page and remember it
    pub async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width as i64)
            .height(viewport.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(Error::Other)?;
        self.page.execute(params).await?;
        *self.viewport.write() = viewport;
        Ok(())
    }

    /// Grow the viewport height, keeping the width, so a clipped element
    /// fits fully inside the capture
    pub async fn grow_viewport_height(&self, height: u32) -> Result<()> {
        let current = self.viewport();
        self.set_viewport(Viewport::new(current.width, height)).await
    }

    /// Flag the session as post-action
    pub fn mark_action_done(&self) {
        self.state.mark_action_done();
    }

    /// Pause media playback and buffering; best-effort
    pub async fn pause_media(&self) {
        if let Err(e) = self.page.evaluate(PAUSE_MEDIA_SCRIPT).await {
            debug!(key = %self.key, error = %e, "media pause failed");
        }
    }

    /// Stop background execution before the session goes idle in the
    /// cache; best-effort
    pub async fn freeze(&self) {
        if let Err(e) = self.page.evaluate(FREEZE_SCRIPT).await {
            debug!(key = %self.key, error = %e, "page freeze failed");
        }
    }

    /// Tear the session down: clear cookies, detach listeners, close the
    /// page — in that order. Idempotent. Every step is attempted even if
    /// an earlier one fails; the first failure is returned for reporting.
    pub async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(key = %self.key, "destroying session");

        let mut first_error: Option<Error> = None;

        if let Err(e) = self
            .page
            .execute(ClearBrowserCookiesParams::default())
            .await
        {
            first_error.get_or_insert_with(|| e.into());
        }

        for handle in self.listeners.lock().drain(..) {
            handle.abort();
        }

        if let Err(e) = self.page.clone().close().await {
            first_error.get_or_insert_with(|| e.into());
        }

        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

#[async_trait]
impl Dispose for Session {
    async fn dispose(&self) -> Result<()> {
        self.destroy().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Listener tasks must never outlive the session even when it was
        // dropped without an explicit destroy.
        for handle in self.listeners.lock().drain(..) {
            handle.abort();
        }
        if !self.destroyed.load(Ordering::SeqCst) {
            warn!(key = %self.key, "session dropped without destroy; page may linger until browser exit");
        }
    }
}
