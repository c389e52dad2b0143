// JSON documents exchanged between client and server

use anyhow::{Context as _, Result};
use fitcrypt_core::{KeyId, WireRun, WireStats};
use fitcrypt_storage::key_id_from_base58;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output of `fitcrypt encrypt`, input of `fitcrypt compute`
#[derive(Serialize, Deserialize)]
pub struct EncryptedRunFile {
    pub key_id: String,
    #[serde(flatten)]
    pub run: WireRun,
}

/// Output of `fitcrypt compute`
#[derive(Serialize, Deserialize)]
pub struct ResultsFile {
    pub key_id: String,
    #[serde(flatten)]
    pub stats: WireStats,
}

/// Any document carrying a summary: a results file or the output of `fitcrypt add`
#[derive(Serialize, Deserialize)]
pub struct SummaryFile {
    pub key_id: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml_score: Option<String>,
}

impl SummaryFile {
    pub fn key_id(&self) -> Result<KeyId> {
        Ok(key_id_from_base58(&self.key_id)?)
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

/// `run.json` -> `run.<kind>.json`, also for `run.enc.json` and `run.results.json`
pub fn sibling(input: &Path, kind: &str) -> PathBuf {
    let name = input.file_name().and_then(|n| n.to_str()).unwrap_or("run");
    let base = name.strip_suffix(".json").unwrap_or(name);
    let base = [".enc", ".results", ".sum"]
        .iter()
        .find_map(|s| base.strip_suffix(s))
        .unwrap_or(base);
    input.with_file_name(format!("{base}.{kind}.json"))
}
