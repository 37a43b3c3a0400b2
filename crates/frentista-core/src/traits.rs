//! Trait seams between the messaging core and its external collaborators.
//!
//! The provider transport, the reply generator, and the persistence
//! backends are all injected through these traits so the dispatcher and
//! conversation engine can be exercised against scripted fakes in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    CampaignSnapshot, Contact, ConversationTurn, DeliveryAttempt, FlowState,
};

/// Receipt returned by the provider for an accepted message.
#[derive(Debug, Clone)]
pub struct ProviderReceipt {
    pub message_id: Option<String>,
}

/// A failed provider call, before retry classification.
#[derive(Debug, Clone)]
pub struct TransportError {
    /// HTTP status when the provider answered, None for socket-level failures.
    pub status: Option<u16>,
    pub message: String,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) => write!(f, "provider error {code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// One raw provider call. Implementations do no retrying — the delivery
/// client owns retry, backoff, and classification.
#[async_trait]
pub trait SendTransport: Send + Sync {
    async fn send(
        &self,
        phone: &str,
        text: &str,
    ) -> std::result::Result<ProviderReceipt, TransportError>;
}

/// Opaque reply text generator. Given the contact name, flow state,
/// inbound text, and recent history, returns the reply body. Callers fall
/// back to a static text when this fails — an error here never reaches
/// the contact.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn reply(
        &self,
        contact_name: Option<&str>,
        state: FlowState,
        inbound: &str,
        history: &[ConversationTurn],
    ) -> Result<String>;
}

/// Key-value store of contacts, keyed by normalized phone.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn get(&self, phone: &str) -> Result<Option<Contact>>;

    async fn upsert(&self, contact: &Contact) -> Result<()>;

    /// Conditional state transition: applies `next` (and optionally the
    /// name) only while the stored state still equals `expected`. Fails
    /// with `StateConflict` when another writer got there first.
    async fn update_state(
        &self,
        phone: &str,
        expected: FlowState,
        next: FlowState,
        name: Option<&str>,
    ) -> Result<()>;
}

/// Append-only log of delivery attempts and conversation turns.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record_attempt(&self, attempt: &DeliveryAttempt) -> Result<()>;

    async fn record_turn(&self, turn: &ConversationTurn) -> Result<()>;

    /// Most recent turns for a phone, oldest first.
    async fn recent_turns(&self, phone: &str, limit: usize) -> Result<Vec<ConversationTurn>>;
}

/// Durable store for campaign snapshots — the unit of crash recovery.
/// Any backend works; the snapshot schema is the contract.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<CampaignSnapshot>>;

    async fn save(&self, snapshot: &CampaignSnapshot) -> Result<()>;

    async fn list(&self) -> Result<Vec<String>>;
}
