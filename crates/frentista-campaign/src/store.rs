//! File-backed campaign job store — one JSON snapshot per job.
//!
//! Human-readable, written atomically (temp file + rename) so a crash
//! mid-save never leaves a torn snapshot behind. Any durable backend can
//! replace this; the snapshot schema is the contract.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use frentista_core::error::{FrentistaError, Result};
use frentista_core::traits::JobStore;
use frentista_core::types::CampaignSnapshot;

pub struct JsonJobStore {
    dir: PathBuf,
}

impl JsonJobStore {
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl JobStore for JsonJobStore {
    async fn load(&self, id: &str) -> Result<Option<CampaignSnapshot>> {
        let file = self.path_for(id);
        if !file.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&file).map_err(|e| {
            FrentistaError::Persistence(format!("read {}: {e}", file.display()))
        })?;
        serde_json::from_str(&json).map(Some).map_err(|e| {
            FrentistaError::Persistence(format!("parse {}: {e}", file.display()))
        })
    }

    async fn save(&self, snapshot: &CampaignSnapshot) -> Result<()> {
        let file = self.path_for(&snapshot.id);
        let tmp = file.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| FrentistaError::Persistence(format!("serialize snapshot: {e}")))?;
        std::fs::write(&tmp, &json).map_err(|e| {
            FrentistaError::Persistence(format!("write {}: {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, &file).map_err(|e| {
            FrentistaError::Persistence(format!("commit {}: {e}", file.display()))
        })?;
        tracing::debug!(
            "💾 saved campaign {} (cursor {}/{})",
            snapshot.id,
            snapshot.cursor,
            snapshot.target_count
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(ids),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
