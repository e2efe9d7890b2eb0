//! Apify-compatible local storage.
//!
//! The actor reads its input from, and writes its results to, the same
//! on-disk layout the Apify tooling uses for local runs:
//!
//! ```text
//! {storage_dir}/
//!   key_value_stores/default/INPUT.json
//!   key_value_stores/default/indeed-output.csv
//!   datasets/default/000000001.json
//! ```
//!
//! [`KeyValueStore`] holds named values (input, cookies, the downloaded CSV,
//! error snapshots); [`Dataset`] is an append-only sequence of JSON records.

pub mod dataset;
pub mod kv;

pub use dataset::Dataset;
pub use kv::{ContentType, KeyValueStore};

/// Store/dataset id used when the platform does not provide one.
pub const DEFAULT_STORE_ID: &str = "default";
