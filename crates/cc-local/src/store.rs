//! On-disk layout shared by the page and instruction stores.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use cc_base::error::BackendResult;

/// SHA-256 of `content`, hex encoded.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:064x}", hasher.finalize())
}

/// Stable file-name-safe key for a directory path.
pub fn directory_key(directory: &str) -> String {
    hash_content(directory)
}

/// Read a JSON document, or the default when the file does not exist yet.
pub fn read_json<T: DeserializeOwned + Default>(path: &Path) -> BackendResult<T> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Write a JSON document through a temporary file so readers never see a
/// partial write.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> BackendResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
