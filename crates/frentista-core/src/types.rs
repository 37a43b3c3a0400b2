//! Domain types — contacts, delivery attempts, conversation turns, and
//! the persisted campaign snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Onboarding stage of a single contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    New,
    AwaitingName,
    Completed,
    WelcomeFailed,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::New => "new",
            FlowState::AwaitingName => "awaiting_name",
            FlowState::Completed => "completed",
            FlowState::WelcomeFailed => "welcome_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(FlowState::New),
            "awaiting_name" => Some(FlowState::AwaitingName),
            "completed" => Some(FlowState::Completed),
            "welcome_failed" => Some(FlowState::WelcomeFailed),
            _ => None,
        }
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A messaging contact, keyed by normalized phone.
/// `name` is set only on the transition into `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub phone: String,
    pub name: Option<String>,
    pub flow_state: FlowState,
    pub opt_in: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Fresh contact in the `New` state, opted in.
    pub fn new(phone: &str) -> Self {
        let now = Utc::now();
        Self {
            phone: phone.to_string(),
            name: None,
            flow_state: FlowState::New,
            opt_in: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Sent,
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Sent => "sent",
            AttemptOutcome::Failed => "failed",
        }
    }
}

/// One terminal provider call. Append-only: written to the audit log
/// exactly once per terminal outcome and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub phone: String,
    pub payload: String,
    pub attempts: u32,
    pub outcome: AttemptOutcome,
    /// Whether the final failure was classified transient.
    pub transient: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// One inbound or outbound message tied to a phone. The most recent N are
/// read back as context for the reply generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub phone: String,
    pub direction: Direction,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn inbound(phone: &str, text: &str) -> Self {
        Self {
            phone: phone.to_string(),
            direction: Direction::Inbound,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn outbound(phone: &str, text: &str) -> Self {
        Self {
            phone: phone.to_string(),
            direction: Direction::Outbound,
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Bulk-send job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Idle,
    Running,
    Paused,
    PausedByLimit,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Idle => "idle",
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::PausedByLimit => "paused_by_limit",
            CampaignStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed target index with the error that exhausted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedIndex {
    pub index: usize,
    pub error: String,
}

/// Persisted campaign snapshot — the unit of crash recovery.
///
/// Carries the immutable target list alongside the progress sets so
/// `resume()` is self-contained; `target_count` must equal `targets.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    pub id: String,
    pub template: String,
    pub targets: Vec<String>,
    pub target_count: usize,
    pub cursor: usize,
    pub sent_indices: Vec<usize>,
    pub failed_indices: Vec<FailedIndex>,
    pub status: CampaignStatus,
    pub hour_window_start: DateTime<Utc>,
    pub sent_in_window: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_state_roundtrip() {
        for state in [
            FlowState::New,
            FlowState::AwaitingName,
            FlowState::Completed,
            FlowState::WelcomeFailed,
        ] {
            assert_eq!(FlowState::parse(state.as_str()), Some(state));
        }
        assert_eq!(FlowState::parse("nope"), None);
    }

    #[test]
    fn test_new_contact_defaults() {
        let c = Contact::new("5599999999999");
        assert_eq!(c.flow_state, FlowState::New);
        assert!(c.opt_in);
        assert!(c.name.is_none());
    }

    #[test]
    fn test_snapshot_serde_roundtrip() {
        let snap = CampaignSnapshot {
            id: "job-1".into(),
            template: "Olá {name}!".into(),
            targets: vec!["5511988887777".into()],
            target_count: 1,
            cursor: 1,
            sent_indices: vec![0],
            failed_indices: vec![],
            status: CampaignStatus::Completed,
            hour_window_start: Utc::now(),
            sent_in_window: 1,
        };
        let json = serde_json::to_string(&snap).unwrap();
        let back: CampaignSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cursor, 1);
        assert_eq!(back.status, CampaignStatus::Completed);
        assert_eq!(back.sent_indices, vec![0]);
    }
}
