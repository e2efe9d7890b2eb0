// SPDX-License-Identifier: MIT
//! Webhook delivery of the downloaded CSV.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::{error, info, warn};

/// Timeout for the whole webhook POST.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// POST the file to `url` as a multipart form with a single `file` field.
///
/// Delivery is best-effort: any failure is logged and reported as `false`,
/// never as an error. The run result records it as `webhook_sent`.
pub async fn post_csv(http: &reqwest::Client, url: &str, path: &Path) -> bool {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(err = %e, path = %path.display(), "failed to read CSV for webhook POST");
            return false;
        }
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.csv".to_string());

    let part = match Part::bytes(bytes).file_name(filename).mime_str("text/csv") {
        Ok(part) => part,
        Err(e) => {
            error!(err = %e, "failed to build webhook form");
            return false;
        }
    };
    let form = Form::new().part("file", part);

    match http
        .post(url)
        .multipart(form)
        .timeout(WEBHOOK_TIMEOUT)
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => {
            info!(url = %url, "successfully posted CSV to webhook");
            true
        }
        Ok(response) => {
            warn!(url = %url, status = %response.status(), "webhook POST returned non-success status");
            false
        }
        Err(e) => {
            error!(err = %e, "failed to POST file to webhook");
            false
        }
    }
}
