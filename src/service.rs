// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request boundary of the rendering proxy
//!
//! The HTTP front door (out of crate) parses its query string into a
//! [`RenderRequest`] and hands it here. Every failure on the way to an
//! artifact is recovered at this boundary and converted into a uniform
//! 400 plain-text response carrying the underlying message; an action
//! either fully succeeds or is fully reported as failed.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::actions::{self, ActionRequest, Artifact, PdfOptions, RenderOptions, ScreenshotOptions};
use crate::browser::{open_session, preflight, BrowserHost, NavigationSpec, Session};
use crate::cache::{spawn_pruner, SessionCache};
use crate::config::{ProxyConfig, Viewport};
use crate::error::{Error, Result};
use crate::network::RequestFilter;

/// Generic first line of every failure response
const FAILURE_PREFIX: &str = "Oops. Something is wrong.";

/// Requested output action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Screenshot,
    Render,
    Pdf,
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "screenshot" => Ok(Action::Screenshot),
            "render" => Ok(Action::Render),
            "pdf" => Ok(Action::Pdf),
            other => Err(Error::config(format!("unknown action: {}", other))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Screenshot => "screenshot",
            Action::Render => "render",
            Action::Pdf => "pdf",
        };
        f.write_str(name)
    }
}

/// One incoming request, as handed over by the HTTP layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderRequest {
    /// Output action; screenshot when unspecified
    pub action: Action,
    /// Decoded target page URL; also the cache key, byte for byte
    pub page_url: String,
    /// Viewport width override
    pub width: Option<u32>,
    /// Viewport height override
    pub height: Option<u32>,
    /// Navigation bound in milliseconds; absent or zero means unbounded
    pub navigation_timeout_ms: Option<u64>,
    /// Action time box in milliseconds; absent means the configured default
    pub action_timeout_ms: Option<u64>,
    /// Host the proxy is served from, for redirect-loop detection
    pub proxy_host: Option<String>,
    /// Screenshot options
    pub screenshot: ScreenshotOptions,
    /// Render options
    pub render: RenderOptions,
    /// PDF options
    pub pdf: PdfOptions,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            action: Action::Screenshot,
            page_url: String::new(),
            width: None,
            height: None,
            navigation_timeout_ms: None,
            action_timeout_ms: None,
            proxy_host: None,
            screenshot: ScreenshotOptions::default(),
            render: RenderOptions::default(),
            pdf: PdfOptions::default(),
        }
    }
}

impl RenderRequest {
    /// Request with defaults for everything but action and URL
    pub fn new(action: Action, page_url: impl Into<String>) -> Self {
        Self {
            action,
            page_url: page_url.into(),
            ..Default::default()
        }
    }

    fn navigation_timeout(&self) -> Option<Duration> {
        match self.navigation_timeout_ms {
            None | Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        }
    }

    fn action_timeout_or(&self, default: Duration) -> Duration {
        self.action_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(default)
    }

    fn action_request(&self) -> ActionRequest {
        match self.action {
            Action::Screenshot => ActionRequest::Screenshot(self.screenshot.clone()),
            Action::Render => ActionRequest::Render(self.render.clone()),
            Action::Pdf => ActionRequest::Pdf(self.pdf.clone()),
        }
    }
}

/// Response handed back to the HTTP layer
#[derive(Debug, Clone)]
pub struct RenderResponse {
    pub status_code: u16,
    pub content_type: String,
    pub body: Bytes,
}

impl RenderResponse {
    fn success(artifact: Artifact) -> Self {
        Self {
            status_code: 200,
            content_type: artifact.content_type.to_string(),
            body: Bytes::from(artifact.bytes),
        }
    }

    fn failure(error: &Error) -> Self {
        Self {
            status_code: 400,
            content_type: "text/plain".to_string(),
            body: Bytes::from(format!("{}\n\n{}", FAILURE_PREFIX, error)),
        }
    }
}

/// Snapshot for a `/status` collaborator
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// URLs currently cached
    pub pages: Vec<String>,
    /// Crate version
    pub version: &'static str,
}

/// The rendering proxy core
pub struct RenderService {
    config: ProxyConfig,
    host: BrowserHost,
    cache: Arc<SessionCache<Session>>,
    filter: Arc<RequestFilter>,
    preflight_client: reqwest::Client,
    pruner: tokio::task::JoinHandle<()>,
}

impl RenderService {
    /// Build the service and start its cache sweeper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let filter = Arc::new(RequestFilter::from_config(&config)?);
        let cache = Arc::new(SessionCache::new(config.cache_capacity, config.cache_ttl));
        let pruner = spawn_pruner(&cache, config.prune_interval);
        let preflight_client = reqwest::Client::builder().build()?;
        let host = BrowserHost::new(config.browser.clone());

        Ok(Self {
            config,
            host,
            cache,
            filter,
            preflight_client,
            pruner,
        })
    }

    /// Handle one request end to end, never propagating failures
    pub async fn handle(&self, request: RenderRequest) -> RenderResponse {
        let url = request.page_url.clone();
        match self.process(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "request failed");
                RenderResponse::failure(&e)
            }
        }
    }

    async fn process(&self, request: &RenderRequest) -> Result<RenderResponse> {
        if request.page_url.is_empty() {
            return Err(Error::MissingUrl);
        }
        let parsed = Url::parse(&request.page_url)
            .map_err(|_| Error::invalid_url(&request.page_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::invalid_url(&request.page_url));
        }

        let viewport = Viewport::new(
            request.width.unwrap_or(self.config.default_viewport.width),
            request.height.unwrap_or(self.config.default_viewport.height),
        );

        if let Some(session) = self.cache.get(&request.page_url).await {
            debug!(url = %request.page_url, "session cache hit");
            return self.dispatch(session, true, viewport, request).await;
        }

        // Concurrent misses for the same URL join here instead of racing
        // to open two sessions.
        let lock = self.cache.creation_lock(&request.page_url);
        let _guard = lock.lock().await;

        if let Some(session) = self.cache.get(&request.page_url).await {
            debug!(url = %request.page_url, "joined in-flight session");
            return self.dispatch(session, true, viewport, request).await;
        }

        preflight(
            &self.preflight_client,
            &parsed,
            self.config.preflight_timeout,
        )
        .await?;

        let browser = self.host.ensure().await?;
        let spec = NavigationSpec {
            page_url: request.page_url.clone(),
            viewport,
            proxy_host: request.proxy_host.clone(),
            timeout: request.navigation_timeout(),
        };
        let session = match open_session(
            &browser,
            self.filter.clone(),
            &spec,
            self.config.network_quiet_delay,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                if e.is_transport_fatal() {
                    self.host.kill().await;
                }
                return Err(e);
            }
        };

        self.dispatch(session, false, viewport, request).await
    }

    async fn dispatch(
        &self,
        session: Arc<Session>,
        cached: bool,
        viewport: Viewport,
        request: &RenderRequest,
    ) -> Result<RenderResponse> {
        match self.perform(&session, cached, viewport, request).await {
            Ok(artifact) => {
                session.mark_action_done();
                if !cached {
                    if self
                        .cache
                        .insert_if_absent(session.key(), session.clone())
                        .await
                    {
                        session.freeze().await;
                    } else if let Err(e) = session.destroy().await {
                        // Lost the insert race; the duplicate must not leak.
                        debug!(url = %session.key(), error = %e, "duplicate session teardown incomplete");
                    }
                }
                info!(action = %request.action, url = %request.page_url, "action done");
                Ok(RenderResponse::success(artifact))
            }
            Err(e) => {
                if let Err(teardown) = session.destroy().await {
                    debug!(url = %session.key(), error = %teardown, "forced teardown incomplete");
                }
                self.cache.remove(session.key()).await;
                if e.is_transport_fatal() {
                    self.host.kill().await;
                }
                Err(e)
            }
        }
    }

    async fn perform(
        &self,
        session: &Session,
        cached: bool,
        viewport: Viewport,
        request: &RenderRequest,
    ) -> Result<Artifact> {
        if cached {
            // Viewport is caller-controlled on every request, hits included.
            session.set_viewport(viewport).await?;
        }

        info!(action = %request.action, url = %request.page_url, "performing action");
        let action = request.action_request();
        let timeout = request.action_timeout_or(self.config.default_action_timeout);
        actions::run(session, &action, timeout).await
    }

    /// URLs of the currently cached sessions
    pub fn cached_urls(&self) -> Vec<String> {
        self.cache.cached_urls()
    }

    /// Snapshot for the `/status` collaborator
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            pages: self.cache.cached_urls(),
            version: crate::VERSION,
        }
    }

    /// Dispose every cached session and stop the browser, for shutdown
    pub async fn shutdown(&self) {
        self.cache.clear().await;
        self.host.kill().await;
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.pruner.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service() -> RenderService {
        RenderService::new(ProxyConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_url_is_rejected() {
        let response = service().handle(RenderRequest::default()).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(response.content_type, "text/plain");
        let body = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(body.starts_with(FAILURE_PREFIX));
        assert!(body.contains("Missing url parameter"));
    }

    #[tokio::test]
    async fn test_non_http_scheme_is_rejected() {
        let request = RenderRequest::new(Action::Screenshot, "ftp://example.com/file");
        let response = service().handle(request).await;
        assert_eq!(response.status_code, 400);
        let body = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(body.contains("Invalid URL"));
    }

    #[tokio::test]
    async fn test_malformed_url_is_rejected() {
        let request = RenderRequest::new(Action::Render, "not a url at all");
        let response = service().handle(request).await;
        assert_eq!(response.status_code, 400);
        let body = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(body.contains("Invalid URL"));
    }

    #[tokio::test]
    async fn test_preflight_rejection_precedes_browser_work() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("content-type", "application/pdf"),
            )
            .mount(&server)
            .await;

        let service = service();
        let request = RenderRequest::new(Action::Screenshot, server.uri());
        let response = service.handle(request).await;

        assert_eq!(response.status_code, 400);
        let body = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(body.contains("Not a HTML page"));
        // Nothing was launched or cached for a rejected URL.
        assert!(!service.host.is_running().await);
        assert!(service.cached_urls().is_empty());
    }

    #[tokio::test]
    async fn test_status_snapshot_is_empty_without_traffic() {
        let service = service();
        let snapshot = service.status();
        assert!(snapshot.pages.is_empty());
        assert_eq!(snapshot.version, crate::VERSION);
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("".parse::<Action>().unwrap(), Action::Screenshot);
        assert_eq!("screenshot".parse::<Action>().unwrap(), Action::Screenshot);
        assert_eq!("RENDER".parse::<Action>().unwrap(), Action::Render);
        assert_eq!("pdf".parse::<Action>().unwrap(), Action::Pdf);
        assert!("gif".parse::<Action>().is_err());
    }

    #[test]
    fn test_navigation_timeout_zero_means_unbounded() {
        let mut request = RenderRequest::default();
        assert!(request.navigation_timeout().is_none());

        request.navigation_timeout_ms = Some(0);
        assert!(request.navigation_timeout().is_none());

        request.navigation_timeout_ms = Some(3000);
        assert_eq!(
            request.navigation_timeout(),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_action_timeout_falls_back_to_default() {
        let mut request = RenderRequest::default();
        let default = Duration::from_secs(10);
        assert_eq!(request.action_timeout_or(default), default);

        request.action_timeout_ms = Some(2500);
        assert_eq!(
            request.action_timeout_or(default),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn test_request_deserializes_from_sparse_json() {
        let request: RenderRequest = serde_json::from_str(
            r#"{ "action": "pdf", "page_url": "https://example.com/doc" }"#,
        )
        .unwrap();
        assert_eq!(request.action, Action::Pdf);
        assert_eq!(request.page_url, "https://example.com/doc");
        assert!(request.width.is_none());
    }

    #[test]
    fn test_failure_response_carries_message() {
        let response = RenderResponse::failure(&Error::timeout("PDF", 10_000));
        assert_eq!(response.status_code, 400);
        let body = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(body.contains("PDF timed out after 10000ms"));
    }
}
