//! Append-only dataset of JSON records.
//!
//! Each pushed record becomes one file named by a 9-digit, zero-padded,
//! strictly increasing index: `000000001.json`, `000000002.json`, ...
//! The next index is derived by scanning the directory, so numbering
//! continues correctly across process restarts. Single-writer by design;
//! nothing in the actor pushes from two tasks at once.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

/// A named dataset rooted in the local storage directory.
#[derive(Debug, Clone)]
pub struct Dataset {
    dir: PathBuf,
}

impl Dataset {
    /// Open the dataset `dataset_id` under `storage_dir`.
    ///
    /// No I/O happens here; the directory is created on first push.
    pub fn open(storage_dir: &Path, dataset_id: &str) -> Self {
        Self {
            dir: storage_dir.join("datasets").join(dataset_id),
        }
    }

    /// Directory holding this dataset's record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append a record, returning the path of the file it was written to.
    pub async fn push<T: Serialize>(&self, record: &T) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating dataset dir {}", self.dir.display()))?;

        let index = self.next_index().await?;
        let path = self.dir.join(format!("{index:09}.json"));
        let raw = serde_json::to_vec_pretty(record).context("serializing dataset record")?;
        tokio::fs::write(&path, raw)
            .await
            .with_context(|| format!("writing dataset record {}", path.display()))?;
        Ok(path)
    }

    /// Number of records currently in the dataset.
    pub async fn item_count(&self) -> Result<usize> {
        Ok(self.record_indices().await?.len())
    }

    async fn next_index(&self) -> Result<u64> {
        let max = self.record_indices().await?.into_iter().max().unwrap_or(0);
        Ok(max + 1)
    }

    /// Indices of all `NNNNNNNNN.json` files present; other files are ignored.
    async fn record_indices(&self) -> Result<Vec<u64>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("listing dataset {}", self.dir.display()))
            }
        };

        let mut indices = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("listing dataset {}", self.dir.display()))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if let Ok(index) = stem.parse::<u64>() {
                indices.push(index);
            }
        }
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn records_are_numbered_from_one() {
        let tmp = TempDir::new().unwrap();
        let ds = Dataset::open(tmp.path(), "default");

        let first = ds.push(&serde_json::json!({ "status": "Success" })).await.unwrap();
        let second = ds.push(&serde_json::json!({ "status": "Failed" })).await.unwrap();

        assert_eq!(first.file_name().unwrap(), "000000001.json");
        assert_eq!(second.file_name().unwrap(), "000000002.json");
        assert_eq!(ds.item_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn numbering_continues_after_restart() {
        let tmp = TempDir::new().unwrap();
        let ds = Dataset::open(tmp.path(), "default");
        std::fs::create_dir_all(ds.dir()).unwrap();
        std::fs::write(ds.dir().join("000000005.json"), b"{}").unwrap();

        let path = ds.push(&serde_json::json!({ "status": "Success" })).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "000000006.json");
    }

    #[tokio::test]
    async fn unrelated_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let ds = Dataset::open(tmp.path(), "default");
        std::fs::create_dir_all(ds.dir()).unwrap();
        std::fs::write(ds.dir().join("README.txt"), b"not a record").unwrap();

        let path = ds.push(&serde_json::json!({})).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "000000001.json");
        assert_eq!(ds.item_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn record_content_round_trips() {
        let tmp = TempDir::new().unwrap();
        let ds = Dataset::open(tmp.path(), "default");

        let path = ds
            .push(&serde_json::json!({ "status": "Failed", "error": "Missing credentials" }))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(path).unwrap();
        let back: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(back["error"], "Missing credentials");
    }
}
