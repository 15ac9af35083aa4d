//! Saved instructions, one JSON document per directory.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use cc_base::error::{BackendError, BackendResult};
use cc_base::types::SavedInstruction;

use crate::store::{directory_key, hash_content, read_json, write_json};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstructionRecord {
    id: String,
    name: String,
    content: String,
    token_count: usize,
    created_at: String,
    updated_at: String,
}

impl InstructionRecord {
    fn to_saved(&self) -> SavedInstruction {
        SavedInstruction {
            id: self.id.clone(),
            name: self.name.clone(),
            content: self.content.clone(),
            token_count: self.token_count,
        }
    }
}

pub struct InstructionStore {
    path: PathBuf,
}

impl InstructionStore {
    pub fn open(data_dir: &Path, directory: &str) -> Self {
        Self { path: data_dir.join("instructions").join(format!("{}.json", directory_key(directory))) }
    }

    fn load(&self) -> BackendResult<Vec<InstructionRecord>> {
        read_json(&self.path)
    }

    pub fn list(&self) -> BackendResult<Vec<SavedInstruction>> {
        Ok(self.load()?.iter().map(InstructionRecord::to_saved).collect())
    }

    pub fn get(&self, id: &str) -> BackendResult<SavedInstruction> {
        self.load()?
            .iter()
            .find(|r| r.id == id)
            .map(InstructionRecord::to_saved)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    /// Update the instruction `id`, or create a new one when `id` is `None`.
    /// Returns the instruction's id.
    pub fn upsert(&self, id: Option<&str>, name: &str, content: &str, token_count: usize) -> BackendResult<String> {
        let mut records = self.load()?;
        let now = Utc::now();
        let stamp = now.to_rfc3339();

        let id = match id {
            Some(id) => {
                let record =
                    records.iter_mut().find(|r| r.id == id).ok_or_else(|| BackendError::NotFound(id.to_string()))?;
                record.name = name.to_string();
                record.content = content.to_string();
                record.token_count = token_count;
                record.updated_at = stamp;
                id.to_string()
            }
            None => {
                let seed = format!("{}{}", name, now.timestamp_nanos_opt().unwrap_or_default());
                let id = hash_content(&seed)[..12].to_string();
                records.push(InstructionRecord {
                    id: id.clone(),
                    name: name.to_string(),
                    content: content.to_string(),
                    token_count,
                    created_at: stamp.clone(),
                    updated_at: stamp,
                });
                id
            }
        };
        write_json(&self.path, &records)?;
        info!(id = %id, tokens = token_count, "instruction saved");
        Ok(id)
    }

    /// Remove every instruction in `ids`; unknown ids are ignored.
    pub fn delete(&self, ids: &[String]) -> BackendResult<()> {
        let mut records = self.load()?;
        records.retain(|r| !ids.contains(&r.id));
        write_json(&self.path, &records)
    }
}
