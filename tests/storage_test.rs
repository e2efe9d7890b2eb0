//! Integration tests for the local storage layout.
//!
//! Exercises the key-value store and dataset through the public API and
//! asserts the on-disk layout matches what the platform tooling expects:
//!   - key_value_stores/default/{key}.{ext}
//!   - datasets/default/{index:09}.json

use indeed_csv_downloader::apify::{ContentType, Dataset, KeyValueStore, DEFAULT_STORE_ID};
use indeed_csv_downloader::config::{ActorConfig, ActorInput};
use indeed_csv_downloader::RunContext;
use tempfile::TempDir;

fn test_config(storage_dir: std::path::PathBuf) -> ActorConfig {
    ActorConfig::from_parts(
        ActorInput::default(),
        storage_dir,
        "INPUT".to_string(),
        "test-run".to_string(),
        None,
        true,
    )
}

#[tokio::test]
async fn test_kv_store_writes_platform_layout() {
    let tmp = TempDir::new().unwrap();
    let store = KeyValueStore::open(tmp.path(), DEFAULT_STORE_ID);

    store
        .set_bytes("indeed-output.csv", b"name,email\n", ContentType::Csv)
        .await
        .unwrap();
    store
        .set_text("indeed_output_filename", "indeed-output.csv")
        .await
        .unwrap();

    let base = tmp.path().join("key_value_stores/default");
    assert!(base.join("indeed-output.csv").is_file());
    assert!(base.join("indeed_output_filename.txt").is_file());
    // The extension is not doubled for keys that already carry it.
    assert!(!base.join("indeed-output.csv.csv").exists());
}

#[tokio::test]
async fn test_dataset_records_are_sequential_json_files() {
    let tmp = TempDir::new().unwrap();
    let dataset = Dataset::open(tmp.path(), DEFAULT_STORE_ID);

    dataset
        .push(&serde_json::json!({ "status": "Success" }))
        .await
        .unwrap();
    dataset
        .push(&serde_json::json!({ "status": "Failed" }))
        .await
        .unwrap();

    let base = tmp.path().join("datasets/default");
    assert!(base.join("000000001.json").is_file());
    assert!(base.join("000000002.json").is_file());
    assert_eq!(dataset.item_count().await.unwrap(), 2);

    let second: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(base.join("000000002.json")).unwrap())
            .unwrap();
    assert_eq!(second["status"], "Failed");
}

#[tokio::test]
async fn test_run_context_scratch_paths() {
    let tmp = TempDir::new().unwrap();
    let ctx = RunContext::new(test_config(tmp.path().to_path_buf())).unwrap();

    assert!(ctx.work_dir().is_dir());
    assert_eq!(ctx.download_dir().parent().unwrap(), ctx.work_dir());
    assert_eq!(
        ctx.out_path().file_name().unwrap().to_str().unwrap(),
        "indeed-output.csv"
    );

    // Stores resolve against the configured storage dir, not the scratch dir.
    ctx.kv.set_text("probe", "ok").await.unwrap();
    assert!(tmp.path().join("key_value_stores/default/probe.txt").is_file());
}

#[tokio::test]
async fn test_scratch_dir_is_removed_on_drop() {
    let tmp = TempDir::new().unwrap();
    let work_dir;
    {
        let ctx = RunContext::new(test_config(tmp.path().to_path_buf())).unwrap();
        work_dir = ctx.work_dir().to_path_buf();
        assert!(work_dir.is_dir());
    }
    assert!(!work_dir.exists());
}
