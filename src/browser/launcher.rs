// Browser process management.
//
// Strategy:
//   1. detect_browser() searches PATH for a supported browser binary.
//   2. BrowserProcess::launch() spawns it headless with
//      --remote-debugging-port=0 and a throwaway profile directory.
//   3. The browser writes `DevToolsActivePort` (port + WebSocket path) into
//      the profile dir; we poll for it and assemble the ws:// URL.
//
// The child is killed when the handle drops; the profile directory is a
// TempDir and disappears with it.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::debug;

/// Browser binaries to probe, in preference order.
pub const CANDIDATE_BROWSERS: &[&str] = &["chromium", "chrome", "google-chrome", "chromium-browser"];

/// How often to poll for the `DevToolsActivePort` file.
const ENDPOINT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Detect the first DevTools-capable browser binary on PATH.
///
/// Returns the binary name (e.g. `"chromium"`) or `None` if none of the
/// candidates can be found.
pub fn detect_browser() -> Option<String> {
    let path_var = std::env::var("PATH").unwrap_or_default();
    for candidate in CANDIDATE_BROWSERS {
        if find_in_path(&path_var, candidate) {
            debug!(browser = *candidate, "browser binary detected on PATH");
            return Some((*candidate).to_string());
        }
    }
    None
}

/// Check if `binary` exists in any directory of a PATH-style variable.
fn find_in_path(path_var: &str, binary: &str) -> bool {
    for dir in path_var.split(':') {
        if dir.is_empty() {
            continue;
        }
        if Path::new(dir).join(binary).is_file() {
            return true;
        }
    }
    false
}

/// Options for [`BrowserProcess::launch`].
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Explicit binary; `None` probes [`CANDIDATE_BROWSERS`] on PATH.
    pub binary: Option<String>,
    /// Run without a visible window (default: true).
    pub headless: bool,
    /// Window size as `(width, height)`.
    pub window: (u32, u32),
    /// How long to wait for the DevTools endpoint to appear.
    pub launch_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            binary: None,
            headless: true,
            window: (1280, 720),
            launch_timeout: Duration::from_secs(30),
        }
    }
}

/// A running browser process with a discovered DevTools endpoint.
pub struct BrowserProcess {
    child: Child,
    /// Keeps the throwaway profile alive for the process lifetime.
    _profile: TempDir,
    ws_url: String,
}

impl BrowserProcess {
    /// Spawn the browser and wait for its DevTools WebSocket endpoint.
    pub async fn launch(opts: &LaunchOptions) -> Result<Self> {
        let binary = match &opts.binary {
            Some(b) => b.clone(),
            None => detect_browser().context(
                "no browser binary found on PATH (tried chromium, chrome, google-chrome, chromium-browser)",
            )?,
        };

        let profile = TempDir::new().context("creating browser profile dir")?;
        let (width, height) = opts.window;

        let mut cmd = Command::new(&binary);
        if opts.headless {
            cmd.arg("--headless");
        }
        cmd.arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .arg(format!("--window-size={width},{height}"))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("about:blank")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        debug!(browser = %binary, headless = opts.headless, "spawning browser");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning browser binary {binary}"))?;

        let ws_url = match wait_for_endpoint(&mut child, profile.path(), opts.launch_timeout).await
        {
            Ok(url) => url,
            Err(e) => {
                let _ = child.kill().await;
                return Err(e);
            }
        };

        debug!(ws_url = %ws_url, "devtools endpoint ready");
        Ok(Self {
            child,
            _profile: profile,
            ws_url,
        })
    }

    /// The `ws://` URL of the browser-level DevTools endpoint.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Kill the browser process. Used after `Browser.close` has been sent,
    /// or when it could not be.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!(err = %e, "browser child already gone");
        }
    }
}

/// Poll the profile dir for `DevToolsActivePort` and build the ws:// URL.
async fn wait_for_endpoint(child: &mut Child, profile: &Path, timeout: Duration) -> Result<String> {
    let port_file = profile.join("DevToolsActivePort");
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait().context("polling browser process")? {
            bail!("browser exited with {status} before the DevTools endpoint appeared");
        }
        if let Ok(contents) = tokio::fs::read_to_string(&port_file).await {
            if let Some((port, path)) = parse_devtools_active_port(&contents) {
                return Ok(format!("ws://127.0.0.1:{port}{path}"));
            }
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("browser did not publish a DevTools endpoint within {timeout:?}");
        }
        tokio::time::sleep(ENDPOINT_POLL_INTERVAL).await;
    }
}

/// Parse the two-line `DevToolsActivePort` format: port, then the browser
/// target path (e.g. `/devtools/browser/<uuid>`). Returns `None` while the
/// file is incomplete; the browser does not write it atomically.
fn parse_devtools_active_port(contents: &str) -> Option<(u16, String)> {
    let mut lines = contents.lines();
    let port = lines.next()?.trim().parse::<u16>().ok()?;
    let path = lines.next()?.trim();
    if !path.starts_with('/') {
        return None;
    }
    Some((port, path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_port_file() {
        let contents = "34521\n/devtools/browser/1f2a9c8e-aaaa-bbbb-cccc-1234567890ab\n";
        let (port, path) = parse_devtools_active_port(contents).unwrap();
        assert_eq!(port, 34521);
        assert_eq!(path, "/devtools/browser/1f2a9c8e-aaaa-bbbb-cccc-1234567890ab");
    }

    #[test]
    fn rejects_partial_port_file() {
        // Port line only, path not flushed yet.
        assert!(parse_devtools_active_port("34521\n").is_none());
        // Empty file.
        assert!(parse_devtools_active_port("").is_none());
        // Garbage port.
        assert!(parse_devtools_active_port("zzz\n/devtools/browser/x\n").is_none());
        // Path must be absolute.
        assert!(parse_devtools_active_port("34521\ndevtools/browser/x\n").is_none());
    }

    #[test]
    fn find_in_path_locates_binary() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fake = tmp.path().join("chromium");
        std::fs::write(&fake, b"#!/bin/sh\n").unwrap();

        let path_var = format!("/nonexistent:{}", tmp.path().display());
        assert!(find_in_path(&path_var, "chromium"));
        assert!(!find_in_path(&path_var, "firefox"));
        assert!(!find_in_path("", "chromium"));
    }
}
