//! CSV download strategies.
//!
//! Three strategies, cheapest first:
//!   1. direct GET when the input names a `.csv` URL
//!   2. clicking export controls and capturing the browser download
//!   3. scanning anchors for `.csv` hrefs and fetching the first one that
//!      returns a plausible body
//!
//! Every strategy is best-effort: it returns the downloaded file's path or
//! `None`, logging its own failures. Only [`process_urls`] decides that the
//! overall attempt failed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::browser::{Browser, Page, Selector};
use crate::config::ActorConfig;
use crate::redact::redact_with_secrets;

use super::{absolutize, is_csv_href, DOWNLOAD_BUTTON_TEXTS, EXPORT_SELECTORS};

/// Timeout for plain HTTP fetches of CSV bodies.
const HTTP_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
/// Bodies at or below this size are discarded as error pages or empty exports.
const MIN_CSV_BYTES: usize = 50;

/// Everything the download strategies need.
pub struct DownloadContext<'a> {
    pub http: &'a reqwest::Client,
    pub config: &'a ActorConfig,
    pub browser: &'a Browser,
    /// Directory the browser drops captured downloads into.
    pub download_dir: &'a Path,
    /// Final path for the downloaded CSV.
    pub out_path: &'a Path,
}

/// Run the strategies in order against the current page.
pub async fn download_csv(page: &Page, ctx: &DownloadContext<'_>) -> Option<PathBuf> {
    if let Some(path) = direct_download_by_url(ctx).await {
        return Some(path);
    }
    if let Some(path) = download_via_click(page, ctx).await {
        return Some(path);
    }
    scan_for_csv_links(page, ctx).await
}

/// Visit each start URL in turn, attempting a download on each.
pub async fn process_urls(page: &Page, ctx: &DownloadContext<'_>) -> Option<PathBuf> {
    let start_urls = &ctx.config.input.start_urls;
    let secrets = [ctx.config.input.indeed_password.as_str()];
    for (i, url) in start_urls.iter().enumerate() {
        // Start URLs can carry credentials; never print them raw.
        let shown = redact_with_secrets(url, &secrets);
        info!(current = i + 1, total = start_urls.len(), url = %shown, "processing start URL");
        if let Err(e) = page.goto(url, ctx.config.nav_timeout).await {
            let detail = redact_with_secrets(&format!("{e:#}"), &secrets);
            warn!(url = %shown, err = %detail, "failed to process start URL");
            continue;
        }
        if let Some(path) = download_csv(page, ctx).await {
            return Some(path);
        }
    }
    None
}

/// Strategy 1: fetch `csv_download_url` directly when it ends in `.csv`.
pub async fn direct_download_by_url(ctx: &DownloadContext<'_>) -> Option<PathBuf> {
    let url = ctx.config.input.csv_download_url.trim();
    if !url.to_lowercase().ends_with(".csv") {
        return None;
    }
    info!("CSV URL looks direct; attempting direct GET");
    match fetch_to_file(ctx.http, url, ctx.out_path, 0).await {
        Ok(true) => Some(ctx.out_path.to_path_buf()),
        Ok(false) => None,
        Err(e) => {
            debug!(err = %e, "direct download attempt failed");
            None
        }
    }
}

/// Strategy 2: click export controls and capture the resulting download.
pub async fn download_via_click(page: &Page, ctx: &DownloadContext<'_>) -> Option<PathBuf> {
    // Text labels first.
    for &text in DOWNLOAD_BUTTON_TEXTS {
        let selector = Selector::Text(text);
        if let Some(path) = click_and_capture(page, ctx, &selector).await {
            return Some(path);
        }
    }
    // Then the generic controls.
    for selector in EXPORT_SELECTORS {
        if let Some(path) = click_and_capture(page, ctx, selector).await {
            return Some(path);
        }
    }
    None
}

/// Strategy 3: scan anchors for `.csv` hrefs and fetch the first plausible one.
pub async fn scan_for_csv_links(page: &Page, ctx: &DownloadContext<'_>) -> Option<PathBuf> {
    match scan_inner(page, ctx).await {
        Ok(found) => found,
        Err(e) => {
            debug!(err = %e, "fallback link scan failed");
            None
        }
    }
}

async fn scan_inner(page: &Page, ctx: &DownloadContext<'_>) -> Result<Option<PathBuf>> {
    let hrefs = page.hrefs().await?;
    let base = page.current_url().await?;
    for href in hrefs {
        if !is_csv_href(&href) {
            continue;
        }
        info!(href = %href, "found CSV link — attempting GET");
        let url = absolutize(&base, &href);
        if fetch_to_file(ctx.http, &url, ctx.out_path, MIN_CSV_BYTES).await? {
            return Ok(Some(ctx.out_path.to_path_buf()));
        }
    }
    Ok(None)
}

async fn click_and_capture(
    page: &Page,
    ctx: &DownloadContext<'_>,
    selector: &Selector,
) -> Option<PathBuf> {
    match page.exists(selector).await {
        Ok(true) => {}
        Ok(false) => return None,
        Err(e) => {
            debug!(selector = %selector, err = %e, "element probe failed");
            return None;
        }
    }
    info!(selector = %selector, "clicking download control");

    // Subscribe before clicking so the begin event cannot be missed.
    let mut events = ctx.browser.events();
    match page.click(selector).await {
        Ok(true) => {}
        Ok(false) => return None,
        Err(e) => {
            debug!(selector = %selector, err = %e, "click failed");
            return None;
        }
    }

    let captured = match ctx
        .browser
        .wait_for_download(&mut events, ctx.download_dir)
        .await
    {
        Ok(path) => path,
        Err(e) => {
            warn!(selector = %selector, err = %e, "no download after clicking");
            return None;
        }
    };

    match finalize_download(&captured, ctx.out_path).await {
        Ok(()) => Some(ctx.out_path.to_path_buf()),
        Err(e) => {
            warn!(err = %e, "moving captured download failed");
            None
        }
    }
}

/// Move a captured (guid-named) download into its final location.
async fn finalize_download(captured: &Path, out_path: &Path) -> Result<()> {
    match tokio::fs::rename(captured, out_path).await {
        Ok(()) => Ok(()),
        // Rename fails across filesystems; fall back to copy + remove.
        Err(_) => {
            tokio::fs::copy(captured, out_path).await?;
            let _ = tokio::fs::remove_file(captured).await;
            Ok(())
        }
    }
}

/// GET `url` and write the body to `path` when the status is 200 and the
/// body is longer than `min_bytes`.
async fn fetch_to_file(
    http: &reqwest::Client,
    url: &str,
    path: &Path,
    min_bytes: usize,
) -> Result<bool> {
    let response = http.get(url).timeout(HTTP_FETCH_TIMEOUT).send().await?;
    if response.status() != reqwest::StatusCode::OK {
        debug!(url = %url, status = %response.status(), "CSV fetch returned non-200");
        return Ok(false);
    }
    let body = response.bytes().await?;
    if body.len() <= min_bytes {
        debug!(url = %url, bytes = body.len(), "CSV body too small — discarding");
        return Ok(false);
    }
    tokio::fs::write(path, &body).await?;
    Ok(true)
}
