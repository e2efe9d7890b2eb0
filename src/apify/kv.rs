//! File-backed key-value store.
//!
//! One file per key under `{storage_dir}/key_value_stores/{store_id}/`, with
//! the file extension chosen by content type. A key that already carries the
//! matching extension (e.g. `indeed-output.csv` stored as CSV) is used as-is
//! so the store never produces `indeed-output.csv.csv`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Content type of a stored value; determines the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Csv,
    Png,
    Text,
}

impl ContentType {
    /// File extension (without the dot) for this content type.
    pub fn extension(&self) -> &'static str {
        match self {
            ContentType::Json => "json",
            ContentType::Csv => "csv",
            ContentType::Png => "png",
            ContentType::Text => "txt",
        }
    }
}

/// A named key-value store rooted in the local storage directory.
#[derive(Debug, Clone)]
pub struct KeyValueStore {
    dir: PathBuf,
}

impl KeyValueStore {
    /// Open the store `store_id` under `storage_dir`.
    ///
    /// No I/O happens here; directories are created on first write.
    pub fn open(storage_dir: &Path, store_id: &str) -> Self {
        Self {
            dir: storage_dir.join("key_value_stores").join(store_id),
        }
    }

    /// Directory holding this store's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str, content_type: ContentType) -> PathBuf {
        let ext = content_type.extension();
        let suffix = format!(".{ext}");
        if key.to_ascii_lowercase().ends_with(&suffix) {
            self.dir.join(key)
        } else {
            self.dir.join(format!("{key}{suffix}"))
        }
    }

    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating key-value store dir {}", self.dir.display()))
    }

    /// Read and deserialize the JSON value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key does not exist. A present but
    /// unparseable value is an error, not `None`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path_for(key, ContentType::Json);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading key-value {}", path.display()))
            }
        };
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("parsing key-value {} as JSON", path.display()))?;
        Ok(Some(value))
    }

    /// Serialize `value` as pretty-printed JSON and store it under `key`.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.path_for(key, ContentType::Json);
        let raw = serde_json::to_vec_pretty(value)
            .with_context(|| format!("serializing key-value {key}"))?;
        tokio::fs::write(&path, raw)
            .await
            .with_context(|| format!("writing key-value {}", path.display()))
    }

    /// Read the raw bytes stored under `key` with the given content type.
    pub async fn get_bytes(&self, key: &str, content_type: ContentType) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key, content_type);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading key-value {}", path.display())),
        }
    }

    /// Store raw bytes under `key` with the given content type.
    pub async fn set_bytes(&self, key: &str, bytes: &[u8], content_type: ContentType) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.path_for(key, content_type);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing key-value {}", path.display()))
    }

    /// Store a plain-text value under `key`.
    pub async fn set_text(&self, key: &str, text: &str) -> Result<()> {
        self.set_bytes(key, text.as_bytes(), ContentType::Text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn json_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = KeyValueStore::open(tmp.path(), "default");

        store
            .set_json("INPUT", &serde_json::json!({ "csv_type": "candidates" }))
            .await
            .unwrap();

        let back: Option<serde_json::Value> = store.get_json("INPUT").await.unwrap();
        assert_eq!(back.unwrap()["csv_type"], "candidates");
        assert!(tmp
            .path()
            .join("key_value_stores/default/INPUT.json")
            .is_file());
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = KeyValueStore::open(tmp.path(), "default");
        let got: Option<serde_json::Value> = store.get_json("INPUT").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn corrupt_json_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = KeyValueStore::open(tmp.path(), "default");
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("INPUT.json"), b"{not json").unwrap();

        let got: Result<Option<serde_json::Value>> = store.get_json("INPUT").await;
        assert!(got.is_err());
    }

    #[tokio::test]
    async fn key_with_matching_extension_is_not_doubled() {
        let tmp = TempDir::new().unwrap();
        let store = KeyValueStore::open(tmp.path(), "default");

        store
            .set_bytes("indeed-output.csv", b"a,b\n1,2\n", ContentType::Csv)
            .await
            .unwrap();

        assert!(store.dir().join("indeed-output.csv").is_file());
        assert!(!store.dir().join("indeed-output.csv.csv").exists());

        let back = store
            .get_bytes("indeed-output.csv", ContentType::Csv)
            .await
            .unwrap();
        assert_eq!(back.unwrap(), b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn text_values_get_txt_extension() {
        let tmp = TempDir::new().unwrap();
        let store = KeyValueStore::open(tmp.path(), "default");
        store
            .set_text("indeed_output_filename", "indeed-output.csv")
            .await
            .unwrap();
        let raw = std::fs::read_to_string(store.dir().join("indeed_output_filename.txt")).unwrap();
        assert_eq!(raw, "indeed-output.csv");
    }
}
