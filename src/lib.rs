pub mod apify;
pub mod browser;
pub mod config;
pub mod doctor;
pub mod indeed;
pub mod redact;
pub mod retry;
pub mod webhook;

// Re-export the flow entry point so main.rs can call it directly.
pub use indeed::flow::run_actor;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempDir;

use apify::{Dataset, KeyValueStore, DEFAULT_STORE_ID};
use config::ActorConfig;

/// Shared state for one actor run, passed to the flow and its helpers.
pub struct RunContext {
    pub config: ActorConfig,
    /// Key-value store under `{storage_dir}/key_value_stores/default`.
    pub kv: KeyValueStore,
    /// Dataset under `{storage_dir}/datasets/default`.
    pub dataset: Dataset,
    /// Shared HTTP client for direct CSV fetches and the webhook POST.
    pub http: reqwest::Client,
    /// Per-run scratch directory; removed when the context drops.
    work: TempDir,
    download_dir: PathBuf,
    out_path: PathBuf,
}

impl RunContext {
    pub fn new(config: ActorConfig) -> Result<Self> {
        let kv = KeyValueStore::open(&config.storage_dir, DEFAULT_STORE_ID);
        let dataset = Dataset::open(&config.storage_dir, DEFAULT_STORE_ID);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("building HTTP client")?;
        let work = TempDir::new().context("creating work directory")?;
        let download_dir = work.path().join("downloads");
        let out_path = work.path().join(&config.input.download_filename);
        Ok(Self {
            config,
            kv,
            dataset,
            http,
            work,
            download_dir,
            out_path,
        })
    }

    /// Root of the per-run scratch directory.
    pub fn work_dir(&self) -> &Path {
        self.work.path()
    }

    /// Where the browser drops captured downloads before they are renamed.
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Final location of the downloaded CSV inside the work directory.
    pub fn out_path(&self) -> &Path {
        &self.out_path
    }
}
