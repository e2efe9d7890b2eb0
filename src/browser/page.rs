// SPDX-License-Identifier: MIT
//! Typed facade over the raw DevTools connection.
//!
//! [`Browser`] owns the process plus the wire client and hands out [`Page`]s
//! (one attached target each). Element interaction is done by evaluating
//! small injected scripts, so a [`Selector`] can address elements either by
//! CSS or by exact visible text; the latter covers the portal's
//! text-labelled buttons that no stable CSS selector reaches.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::cdp::{wait_for_event, CdpClient, CdpEvent};
use super::launcher::{BrowserProcess, LaunchOptions};

/// Pause after load events for late XHR-driven DOM updates.
const SETTLE_DELAY: Duration = Duration::from_millis(500);
/// Per-command response timeout on the wire.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a click may take to produce a `downloadWillBegin` event.
const DOWNLOAD_BEGIN_GRACE: Duration = Duration::from_secs(5);
/// How long a started download may take to complete.
const DOWNLOAD_COMPLETE_TIMEOUT: Duration = Duration::from_secs(60);

// ─── Selector ─────────────────────────────────────────────────────────────────

/// How an element is addressed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// A CSS selector, e.g. `input[type="email"]`.
    Css(&'static str),
    /// Exact visible text of a clickable or labelled element.
    Text(&'static str),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "css={css}"),
            Selector::Text(text) => write!(f, "text={text}"),
        }
    }
}

/// Elements considered when matching by visible text.
const TEXT_MATCH_ROOTS: &str =
    r#"a, button, [role="button"], input[type="submit"], input[type="button"], span, div"#;

/// JS string literal for `s` (a JSON string is one).
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_default()
}

/// JS expression evaluating to the first element matched by `selector`,
/// or `undefined`.
fn finder_js(selector: &Selector) -> String {
    match selector {
        Selector::Css(css) => format!("document.querySelector({})", js_string(css)),
        Selector::Text(text) => format!(
            "Array.from(document.querySelectorAll({})).find(el => ((el.innerText || el.value || '') + '').trim() === {})",
            js_string(TEXT_MATCH_ROOTS),
            js_string(text)
        ),
    }
}

// ─── Cookie ───────────────────────────────────────────────────────────────────

/// A browser cookie, in the protocol's own field layout.
///
/// Deserialized from `Storage.getCookies` (extra fields ignored) and
/// serialized back for `Storage.setCookies` (absent fields omitted).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Unix timestamp in seconds; `-1` marks a session cookie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

// ─── Browser ──────────────────────────────────────────────────────────────────

/// A running browser plus its DevTools connection.
pub struct Browser {
    process: BrowserProcess,
    client: Arc<CdpClient>,
}

impl Browser {
    /// Launch a browser process and connect to its DevTools endpoint.
    pub async fn launch(opts: &LaunchOptions) -> Result<Self> {
        let process = BrowserProcess::launch(opts).await?;
        let client = CdpClient::connect(process.ws_url(), CALL_TIMEOUT)
            .await
            .context("connecting to browser devtools endpoint")?;
        Ok(Self {
            process,
            client: Arc::new(client),
        })
    }

    /// Open a new tab and attach to it.
    pub async fn new_page(&self) -> Result<Page> {
        let created = self
            .client
            .call("Target.createTarget", None, json!({ "url": "about:blank" }))
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Target.createTarget returned no targetId"))?
            .to_string();

        let attached = self
            .client
            .call(
                "Target.attachToTarget",
                None,
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Target.attachToTarget returned no sessionId"))?
            .to_string();

        let page = Page {
            client: self.client.clone(),
            session_id,
        };
        page.call("Page.enable", json!({})).await?;
        // Lifecycle events carry the loader id goto() correlates on.
        page.call("Page.setLifecycleEventsEnabled", json!({ "enabled": true }))
            .await?;
        page.call("Runtime.enable", json!({})).await?;
        Ok(page)
    }

    /// Route downloads into `dir` (files named by their opaque guid) and
    /// enable download progress events.
    pub async fn enable_downloads(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating download dir {}", dir.display()))?;
        self.client
            .call(
                "Browser.setDownloadBehavior",
                None,
                json!({
                    "behavior": "allowAndName",
                    "downloadPath": dir.to_string_lossy(),
                    "eventsEnabled": true,
                }),
            )
            .await?;
        Ok(())
    }

    /// Subscribe to browser events. Subscribe before the triggering action.
    pub fn events(&self) -> broadcast::Receiver<CdpEvent> {
        self.client.events()
    }

    /// All cookies known to the browser.
    pub async fn cookies(&self) -> Result<Vec<Cookie>> {
        let result = self
            .client
            .call("Storage.getCookies", None, json!({}))
            .await?;
        let cookies = result
            .get("cookies")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(cookies).context("parsing cookies from browser")
    }

    /// Install cookies into the browser (session restore).
    pub async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        self.client
            .call("Storage.setCookies", None, json!({ "cookies": cookies }))
            .await?;
        Ok(())
    }

    /// Wait for the download triggered just before this call: first the
    /// `downloadWillBegin` naming the guid, then completion of that guid.
    ///
    /// Returns the path of the finished file inside `dir`. The receiver must
    /// have been obtained from [`Browser::events`] *before* the click.
    pub async fn wait_for_download(
        &self,
        rx: &mut broadcast::Receiver<CdpEvent>,
        dir: &Path,
    ) -> Result<PathBuf> {
        let begin = wait_for_event(rx, DOWNLOAD_BEGIN_GRACE, "downloadWillBegin", |e| {
            e.method == "Browser.downloadWillBegin"
        })
        .await
        .context("no download started")?;
        let guid = begin
            .params
            .get("guid")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("downloadWillBegin event without guid"))?
            .to_string();
        let suggested = begin
            .params
            .get("suggestedFilename")
            .and_then(Value::as_str)
            .unwrap_or("");
        debug!(guid = %guid, suggested = %suggested, "download started");

        let done = wait_for_event(rx, DOWNLOAD_COMPLETE_TIMEOUT, "downloadProgress", |e| {
            e.method == "Browser.downloadProgress"
                && e.params.get("guid").and_then(Value::as_str) == Some(guid.as_str())
                && matches!(
                    e.params.get("state").and_then(Value::as_str),
                    Some("completed") | Some("canceled")
                )
        })
        .await
        .context("download did not finish")?;

        if done.params.get("state").and_then(Value::as_str) == Some("canceled") {
            bail!("download was canceled by the browser");
        }
        Ok(dir.join(&guid))
    }

    /// Close the browser: polite `Browser.close` first, then kill.
    pub async fn close(mut self) {
        if let Err(e) = self.client.call("Browser.close", None, json!({})).await {
            debug!(err = %e, "Browser.close failed — killing process");
        }
        self.process.kill().await;
    }
}

// ─── Page ─────────────────────────────────────────────────────────────────────

/// One attached browser tab.
pub struct Page {
    client: Arc<CdpClient>,
    session_id: String,
}

/// True when `event` is the `load` lifecycle milestone of the navigation
/// identified by `loader_id` on `session_id`. Loader ids are unique per
/// navigation, so subframe loads and stale main-frame loads never match.
fn lifecycle_load_matches(event: &CdpEvent, session_id: &str, loader_id: &str) -> bool {
    event.method == "Page.lifecycleEvent"
        && event.session_id.as_deref() == Some(session_id)
        && event.params.get("name").and_then(Value::as_str) == Some("load")
        && event.params.get("loaderId").and_then(Value::as_str) == Some(loader_id)
}

impl Page {
    async fn call(&self, method: &str, params: Value) -> Result<Value, super::cdp::CdpError> {
        self.client
            .call(method, Some(&self.session_id), params)
            .await
    }

    /// Navigate and wait for the new document's load, then a short settle
    /// delay for late XHR updates (the portal renders its tables client-side).
    ///
    /// The wait is keyed on this navigation's loader id, so a load event left
    /// over from an earlier navigation on the same tab cannot satisfy it.
    pub async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        debug!(url = %url, "navigating");
        let mut events = self.client.events();
        let result = self
            .call("Page.navigate", json!({ "url": url }))
            .await
            .with_context(|| format!("navigating to {url}"))?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            if !error_text.is_empty() {
                bail!("navigation to {url} failed: {error_text}");
            }
        }

        // No loaderId means a same-document navigation: nothing will load.
        if let Some(loader_id) = result.get("loaderId").and_then(Value::as_str) {
            let session = self.session_id.clone();
            let loader = loader_id.to_string();
            wait_for_event(&mut events, timeout, "page load", |e| {
                lifecycle_load_matches(e, &session, &loader)
            })
            .await
            .with_context(|| format!("waiting for {url} to load"))?;
        }

        tokio::time::sleep(SETTLE_DELAY).await;
        Ok(())
    }

    /// Settle after an in-page action that may trigger a navigation (form
    /// submit etc.). Gives the navigation a head start, then polls
    /// `document.readyState` until `complete` or the timeout passes.
    /// SPA flows often swap the DOM without navigating, so not settling is
    /// logged, never an error.
    pub async fn settle_after_action(&self, timeout: Duration) {
        tokio::time::sleep(SETTLE_DELAY).await;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.eval("document.readyState").await {
                Ok(v) if v.as_str() == Some("complete") => break,
                Ok(_) => trace!("document still loading"),
                // Execution context destroyed mid-navigation: keep polling.
                Err(e) => trace!(err = %e, "readyState probe failed during navigation"),
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(timeout = ?timeout, "page did not settle — continuing");
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        tokio::time::sleep(SETTLE_DELAY).await;
    }

    /// Evaluate a JavaScript expression, returning its JSON value.
    /// Promises are awaited; exceptions become errors.
    pub async fn eval(&self, expression: &str) -> Result<Value> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("unknown script error");
            bail!("script failed: {text}");
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Whether the selector matches anything right now.
    pub async fn exists(&self, selector: &Selector) -> Result<bool> {
        let expr = format!("!!({})", finder_js(selector));
        Ok(self.eval(&expr).await?.as_bool().unwrap_or(false))
    }

    /// Click the first match. `Ok(false)` when nothing matches.
    pub async fn click(&self, selector: &Selector) -> Result<bool> {
        let expr = format!(
            "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
            finder_js(selector)
        );
        let clicked = self.eval(&expr).await?.as_bool().unwrap_or(false);
        if clicked {
            trace!(selector = %selector, "clicked");
        }
        Ok(clicked)
    }

    /// Focus the first match and set its value, firing input/change events
    /// so framework-bound forms notice. `Ok(false)` when nothing matches.
    pub async fn fill(&self, selector: &Selector, value: &str) -> Result<bool> {
        let expr = format!(
            "(() => {{ const el = {}; if (!el) return false; el.focus(); el.value = {}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
            finder_js(selector),
            js_string(value)
        );
        Ok(self.eval(&expr).await?.as_bool().unwrap_or(false))
    }

    /// `href` attributes of all anchors, exactly as written in the DOM
    /// (relative links stay relative).
    pub async fn hrefs(&self) -> Result<Vec<String>> {
        let value = self
            .eval(
                "Array.from(document.querySelectorAll('a'))\
                 .map(a => a.getAttribute('href'))\
                 .filter(h => typeof h === 'string' && h.length > 0)",
            )
            .await?;
        serde_json::from_value(value).context("parsing href list")
    }

    /// The page's current URL.
    pub async fn current_url(&self) -> Result<String> {
        let value = self.eval("window.location.href").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("window.location.href was not a string"))
    }

    /// PNG screenshot of the current viewport.
    pub async fn screenshot_png(&self) -> Result<Vec<u8>> {
        let result = self
            .call("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Page.captureScreenshot returned no data"))?;
        BASE64.decode(data).context("decoding screenshot payload")
    }
}
