//! Actor configuration.
//!
//! Input arrives as a single JSON object. On the platform it is found at
//! `{storage_dir}/key_value_stores/default/INPUT.json`; local runs may point
//! at any file with `--input`. Credentials can additionally be supplied via
//! `INDEED_USERNAME` / `INDEED_PASSWORD`.
//!
//! Priority (highest to lowest):
//!   1. CLI / env (passed as `Some(value)` from clap, or read here)
//!   2. Input JSON
//!   3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::apify::{KeyValueStore, DEFAULT_STORE_ID};

pub const DEFAULT_START_URL: &str = "https://employers.indeed.com/candidates";
pub const DEFAULT_LOGIN_URL: &str = "https://employers.indeed.com/";
pub const DEFAULT_STORAGE_DIR: &str = "./storage";
pub const DEFAULT_INPUT_KEY: &str = "INPUT";
const DEFAULT_DOWNLOAD_FILENAME: &str = "indeed-output.csv";
const DEFAULT_CSV_TYPE: &str = "candidates";
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

// ─── ActorInput ───────────────────────────────────────────────────────────────

/// The actor's input record, as written by the platform or a local caller.
///
/// Every field is optional in the JSON; missing fields take the defaults
/// below. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActorInput {
    /// Pages to visit looking for an export (default: the candidates page).
    pub start_urls: Vec<String>,
    /// Page opened to authenticate when no valid session exists.
    pub login_url: String,
    /// Portal account email. Required unless supplied via `INDEED_USERNAME`.
    pub indeed_username: String,
    /// Portal account password. Required unless supplied via `INDEED_PASSWORD`.
    pub indeed_password: String,
    /// Webhook that receives the downloaded CSV as a multipart POST.
    /// Empty = no webhook delivery.
    pub n8n_webhook_url: String,
    /// Persist session cookies to the key-value store after login (default: true).
    pub save_cookies: bool,
    /// Filename for the downloaded CSV, used on disk and in the key-value store.
    pub download_filename: String,
    /// Total full-flow attempts; 0 is treated as 1 (default: 2).
    pub max_retries: u32,
    /// Navigation timeout in milliseconds (default: 30000).
    pub timeout: u64,
    /// Label recorded in the result dataset (default: "candidates").
    pub csv_type: String,
    /// Known direct URL of the CSV. When it ends in `.csv` it is fetched
    /// over HTTP before any browser-based strategy runs.
    pub csv_download_url: String,
    /// Caller correlation id, echoed into the result record.
    pub job_id: String,
}

impl Default for ActorInput {
    fn default() -> Self {
        Self {
            start_urls: vec![DEFAULT_START_URL.to_string()],
            login_url: DEFAULT_LOGIN_URL.to_string(),
            indeed_username: String::new(),
            indeed_password: String::new(),
            n8n_webhook_url: String::new(),
            save_cookies: true,
            download_filename: DEFAULT_DOWNLOAD_FILENAME.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT_MS,
            csv_type: DEFAULT_CSV_TYPE.to_string(),
            csv_download_url: String::new(),
            job_id: String::new(),
        }
    }
}

// ─── ActorConfig ──────────────────────────────────────────────────────────────

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// The resolved input record (env credential overrides already applied).
    pub input: ActorInput,
    /// Root of the local storage layout.
    pub storage_dir: PathBuf,
    /// Key the input record was read from (default: `INPUT`).
    pub input_key: String,
    /// Run id: `APIFY_ACTOR_RUN_ID` when set, otherwise a fresh UUID.
    pub run_id: String,
    /// Explicit browser binary; `None` = probe `$PATH` for a Chromium.
    pub browser_binary: Option<String>,
    /// Run the browser headless (default; `--headful` flips it for debugging).
    pub headless: bool,
    /// Navigation timeout derived from `input.timeout`.
    pub nav_timeout: Duration,
    /// Trimmed webhook URL; `None` when the input left it empty.
    pub webhook_url: Option<String>,
}

impl ActorConfig {
    /// Build config from CLI/env args plus the input record.
    ///
    /// The input is read from `input_path` when given, otherwise from the
    /// default key-value store. A missing input record is not an error: the
    /// defaults apply and credential validation happens later in the flow.
    pub async fn resolve(
        input_path: Option<&Path>,
        storage_dir: Option<PathBuf>,
        browser: Option<String>,
        headful: bool,
    ) -> Result<Self> {
        let storage_dir = storage_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));

        let input_key = env_nonempty("APIFY_INPUT_KEY")
            .unwrap_or_else(|| DEFAULT_INPUT_KEY.to_string());

        let mut input = match input_path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading input file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing input file {}", path.display()))?
            }
            None => {
                let store = KeyValueStore::open(&storage_dir, DEFAULT_STORE_ID);
                match store.get_json::<ActorInput>(&input_key).await? {
                    Some(input) => input,
                    None => {
                        debug!(key = %input_key, "no input record in key-value store — using defaults");
                        ActorInput::default()
                    }
                }
            }
        };
        apply_env_overrides(&mut input);

        let run_id = env_nonempty("APIFY_ACTOR_RUN_ID")
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(Self::from_parts(
            input,
            storage_dir,
            input_key,
            run_id,
            browser,
            !headful,
        ))
    }

    /// Assemble a config from already-resolved pieces. Pure; no env or I/O.
    pub fn from_parts(
        input: ActorInput,
        storage_dir: PathBuf,
        input_key: String,
        run_id: String,
        browser_binary: Option<String>,
        headless: bool,
    ) -> Self {
        let nav_timeout = Duration::from_millis(input.timeout.max(1));
        let webhook_url = Some(input.n8n_webhook_url.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self {
            input,
            storage_dir,
            input_key,
            run_id,
            browser_binary,
            headless,
            nav_timeout,
            webhook_url,
        }
    }

    /// Both credentials present (after env overrides).
    pub fn has_credentials(&self) -> bool {
        !self.input.indeed_username.is_empty() && !self.input.indeed_password.is_empty()
    }

    /// Copy of the input safe to print: the password is masked.
    pub fn redacted_input(&self) -> ActorInput {
        let mut input = self.input.clone();
        if !input.indeed_password.is_empty() {
            input.indeed_password = "[REDACTED]".to_string();
        }
        input
    }
}

fn apply_env_overrides(input: &mut ActorInput) {
    if let Some(v) = env_nonempty("INDEED_USERNAME") {
        input.indeed_username = v;
    }
    if let Some(v) = env_nonempty("INDEED_PASSWORD") {
        input.indeed_password = v;
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}
