// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Guarded navigation for cache misses
//!
//! Opens a fresh session, installs the request filter and the
//! redirect-loop observer before any navigation traffic, applies the
//! viewport, then races the navigation against the observer under an
//! optional caller-supplied time bound. A failure at any step destroys
//! the partially built session; broken sessions are never cached.

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, ErrorReason, EventRequestWillBeSent,
    EventResponseReceived,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, info};
use url::Url;

use crate::browser::Session;
use crate::config::Viewport;
use crate::error::{Error, Result};
use crate::network::{truncate, FilterVerdict, RequestEvent, RequestFilter, ResourceType};

/// Log-line URL budget
const LOG_URL_LEN: usize = 70;

/// What one guarded navigation should do
#[derive(Debug, Clone)]
pub struct NavigationSpec {
    /// Exact user-supplied page URL; doubles as the cache key
    pub page_url: String,
    /// Viewport to apply before navigating
    pub viewport: Viewport,
    /// Host the proxy itself is being served from, for loop detection
    pub proxy_host: Option<String>,
    /// Navigation time bound; `None` or zero means unbounded
    pub timeout: Option<Duration>,
}

/// Content-type preflight.
///
/// Acceptable outcomes: the HEAD request fails to return headers at all
/// (the browser will surface the real failure during navigation), or a
/// 2xx response whose content-type contains `text/html`. Anything else
/// rejects the URL before a browser session is even opened.
pub async fn preflight(client: &reqwest::Client, url: &Url, limit: Duration) -> Result<()> {
    let response = match tokio::time::timeout(limit, client.head(url.clone()).send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            debug!(url = %url, error = %e, "preflight returned no headers; continuing");
            return Ok(());
        }
        Err(_) => {
            debug!(url = %url, "preflight timed out; continuing");
            return Ok(());
        }
    };

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if response.status().is_success() && content_type.to_ascii_lowercase().contains("text/html") {
        Ok(())
    } else {
        Err(Error::NotHtml)
    }
}

/// Open a new session and navigate it until settled.
///
/// On success the returned session has media paused and its filter
/// active; on failure the partial session has already been destroyed.
pub async fn open_session(
    browser: &Browser,
    filter: Arc<RequestFilter>,
    spec: &NavigationSpec,
    quiet_delay: Duration,
) -> Result<Arc<Session>> {
    let page = browser.new_page("about:blank").await?;
    let session = Arc::new(Session::new(&spec.page_url, page, spec.viewport));

    match drive(&session, filter, spec, quiet_delay).await {
        Ok(()) => Ok(session),
        Err(e) => {
            if let Err(teardown) = session.destroy().await {
                debug!(url = %spec.page_url, error = %teardown, "teardown of failed session incomplete");
            }
            Err(e)
        }
    }
}

async fn drive(
    session: &Arc<Session>,
    filter: Arc<RequestFilter>,
    spec: &NavigationSpec,
    quiet_delay: Duration,
) -> Result<()> {
    let page = session.page().clone();

    // Interception must be live before the first navigation request.
    install_filter(&page, session, filter).await?;

    let redirect_rx = match spec.proxy_host.as_deref() {
        Some(host) if !host.is_empty() => {
            Some(install_redirect_observer(&page, session, host.to_string()).await?)
        }
        _ => None,
    };

    session.set_viewport(spec.viewport).await?;

    info!(url = %spec.page_url, "fetching page");
    let nav = navigate_settled(&page, &spec.page_url, spec.timeout, quiet_delay);

    let outcome = match redirect_rx {
        Some(rx) => {
            let redirect_fired = async move {
                match rx.await {
                    Ok(location) => location,
                    // Observer went away without firing; navigation decides.
                    Err(_) => std::future::pending().await,
                }
            };
            tokio::select! {
                location = redirect_fired => Err(Error::redirect_loop(location)),
                res = nav => res,
            }
        }
        None => nav.await,
    };
    outcome?;

    session.pause_media().await;
    Ok(())
}

/// Navigate and wait for the page to settle: navigation commit, load,
/// then a short network-quiet delay. Chromium exposes no network-idle
/// barrier over CDP, so the quiet delay approximates `networkidle`.
async fn navigate_settled(
    page: &Page,
    url: &str,
    timeout: Option<Duration>,
    quiet_delay: Duration,
) -> Result<()> {
    let settle = async {
        page.goto(url)
            .await
            .map_err(|e| Error::navigation(url, e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| Error::navigation(url, e.to_string()))?;
        tokio::time::sleep(quiet_delay).await;
        Ok(())
    };

    match timeout {
        Some(limit) if !limit.is_zero() => tokio::time::timeout(limit, settle)
            .await
            .map_err(|_| Error::timeout("Navigation", limit.as_millis() as u64))?,
        _ => settle.await,
    }
}

/// Enable Fetch-domain interception and spawn the decision loop.
///
/// The filter stays installed for the whole session lifetime; it is
/// evaluated per request, never reinstalled.
async fn install_filter(
    page: &Page,
    session: &Arc<Session>,
    filter: Arc<RequestFilter>,
) -> Result<()> {
    page.execute(NetworkEnableParams::default()).await?;
    page.execute(FetchEnableParams {
        patterns: Some(vec![RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_type: None,
            request_stage: None,
        }]),
        handle_auth_requests: None,
    })
    .await?;

    let mut events = page.event_listener::<EventRequestPaused>().await?;
    let state = session.state();
    let commands = page.clone();

    let handle = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let request = RequestEvent {
                url: event.request.url.clone(),
                method: event.request.method.clone(),
                resource_type: ResourceType::from(event.resource_type.clone()),
                elapsed: state.elapsed(),
                request_count: state.request_count(),
                action_done: state.action_done(),
            };
            let short_url = truncate(&request.url, LOG_URL_LEN);

            match filter.decide(&request) {
                FilterVerdict::Allow => {
                    state.count_request();
                    debug!(method = %request.method, url = %short_url, "request allowed");
                    let cmd = ContinueRequestParams::new(event.request_id.clone());
                    if let Err(e) = commands.execute(cmd).await {
                        debug!(error = %e, "continue request failed");
                    }
                }
                FilterVerdict::Abort(reason) => {
                    debug!(method = %request.method, url = %short_url, ?reason, "request aborted");
                    let cmd = FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    );
                    if let Err(e) = commands.execute(cmd).await {
                        debug!(error = %e, "abort request failed");
                    }
                }
            }
        }
    });
    session.attach_listener(handle);
    Ok(())
}

/// Watch responses for a `Location` header pointing back at the proxy
/// itself. Firing fails the navigation with a redirect-loop
/// classification instead of letting the page recurse through us.
async fn install_redirect_observer(
    page: &Page,
    session: &Arc<Session>,
    own_host: String,
) -> Result<oneshot::Receiver<String>> {
    // Redirect hops never reach responseReceived; their headers ride on
    // the follow-up requestWillBeSent event, so both streams are watched.
    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
    let (tx, rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let mut tx = Some(tx);
        loop {
            let headers = tokio::select! {
                maybe = responses.next() => match maybe {
                    Some(event) => serde_json::to_value(&event.response.headers).unwrap_or_default(),
                    None => break,
                },
                maybe = requests.next() => match maybe {
                    Some(event) => match &event.redirect_response {
                        Some(response) => serde_json::to_value(&response.headers).unwrap_or_default(),
                        None => continue,
                    },
                    None => break,
                },
            };
            if let Some(location) = redirect_location(&headers, &own_host) {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(location);
                }
                break;
            }
        }
    });
    session.attach_listener(handle);
    Ok(rx)
}

/// The offending `Location` value, if a response header redirects back
/// through `own_host`
pub(crate) fn redirect_location(headers: &serde_json::Value, own_host: &str) -> Option<String> {
    let object = headers.as_object()?;
    for (name, value) in object {
        if name.eq_ignore_ascii_case("location") {
            if let Some(location) = value.as_str() {
                if location.contains(own_host) {
                    return Some(location.to_string());
                }
            }
        }
    }
    None
}
