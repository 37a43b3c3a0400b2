//! Campaign job model — progress accounting and snapshot conversion.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use frentista_core::error::{FrentistaError, Result};
use frentista_core::types::{CampaignSnapshot, CampaignStatus, FailedIndex};

/// One bulk send over an immutable target snapshot.
///
/// Progress invariant, held at every persisted checkpoint:
/// `cursor == sent.len() + failed.len()`, the two sets are disjoint, and
/// every recorded index is below the cursor.
#[derive(Debug, Clone)]
pub struct CampaignJob {
    pub id: String,
    pub template: String,
    pub targets: Vec<String>,
    /// Index of the next unsent target.
    pub cursor: usize,
    pub sent: BTreeSet<usize>,
    pub failed: BTreeMap<usize, String>,
    pub status: CampaignStatus,
    pub hour_window_start: DateTime<Utc>,
    pub sent_in_window: u32,
}

impl CampaignJob {
    pub fn new(targets: Vec<String>, template: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            template: template.to_string(),
            targets,
            cursor: 0,
            sent: BTreeSet::new(),
            failed: BTreeMap::new(),
            status: CampaignStatus::Idle,
            hour_window_start: Utc::now(),
            sent_in_window: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.targets.len()
    }

    pub fn snapshot(&self) -> CampaignSnapshot {
        CampaignSnapshot {
            id: self.id.clone(),
            template: self.template.clone(),
            targets: self.targets.clone(),
            target_count: self.targets.len(),
            cursor: self.cursor,
            sent_indices: self.sent.iter().copied().collect(),
            failed_indices: self
                .failed
                .iter()
                .map(|(index, error)| FailedIndex {
                    index: *index,
                    error: error.clone(),
                })
                .collect(),
            status: self.status,
            hour_window_start: self.hour_window_start,
            sent_in_window: self.sent_in_window,
        }
    }

    /// Rebuild from a persisted snapshot, validating the progress
    /// invariants. A snapshot that fails them came from a torn write or
    /// an outside edit; resuming from it could double-send.
    pub fn from_snapshot(snap: CampaignSnapshot) -> Result<Self> {
        if snap.target_count != snap.targets.len() {
            return Err(corrupt(&snap.id, "target_count does not match targets"));
        }
        let sent: BTreeSet<usize> = snap.sent_indices.iter().copied().collect();
        let failed: BTreeMap<usize, String> = snap
            .failed_indices
            .iter()
            .map(|f| (f.index, f.error.clone()))
            .collect();
        if sent.len() + failed.len() != snap.cursor {
            return Err(corrupt(&snap.id, "cursor does not match recorded outcomes"));
        }
        if sent.iter().any(|i| failed.contains_key(i)) {
            return Err(corrupt(&snap.id, "an index is both sent and failed"));
        }
        if sent
            .iter()
            .chain(failed.keys())
            .any(|i| *i >= snap.cursor)
        {
            return Err(corrupt(&snap.id, "a recorded index is past the cursor"));
        }
        if snap.cursor > snap.targets.len() {
            return Err(corrupt(&snap.id, "cursor is past the target list"));
        }

        Ok(Self {
            id: snap.id,
            template: snap.template,
            targets: snap.targets,
            cursor: snap.cursor,
            sent,
            failed,
            status: snap.status,
            hour_window_start: snap.hour_window_start,
            sent_in_window: snap.sent_in_window,
        })
    }

    /// Read-only view returned by every control-surface call.
    pub fn view(&self, window_limit: u32) -> JobView {
        let pause_reason = match self.status {
            CampaignStatus::PausedByLimit => Some(format!(
                "hourly send budget exhausted ({}/{}); resume after the window resets",
                self.sent_in_window, window_limit
            )),
            CampaignStatus::Paused => Some("paused by operator".into()),
            _ => None,
        };
        JobView {
            id: self.id.clone(),
            status: self.status,
            cursor: self.cursor,
            sent: self.sent.len(),
            failed: self.failed.len(),
            total: self.targets.len(),
            window_used: self.sent_in_window,
            window_limit,
            pause_reason,
        }
    }
}

fn corrupt(id: &str, detail: &str) -> FrentistaError {
    FrentistaError::Persistence(format!("corrupt snapshot for campaign {id}: {detail}"))
}

/// Operator-facing summary of a campaign.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobView {
    pub id: String,
    pub status: CampaignStatus,
    pub cursor: usize,
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    pub window_used: u32,
    pub window_limit: u32,
    pub pause_reason: Option<String>,
}
