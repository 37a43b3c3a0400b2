//! Per-contact conversation state machine.
//!
//! One closed enum, one transition path: welcome on first contact, name
//! collection, then free-form replies. Transitions for a given phone are
//! serialized by a per-key async lock, and the contact store's
//! conditional update is the second line of defense — a cross-process
//! race surfaces as `StateConflict` and is retried here, never silently
//! overwritten.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex;

use frentista_core::config::ConversationConfig;
use frentista_core::error::{FrentistaError, Result};
use frentista_core::phone;
use frentista_core::template;
use frentista_core::traits::{AuditLog, ContactStore, ReplyGenerator};
use frentista_core::types::{Contact, ConversationTurn, FlowState};
use frentista_delivery::DeliveryClient;

use crate::names;

pub struct ConversationEngine {
    contacts: Arc<dyn ContactStore>,
    audit: Arc<dyn AuditLog>,
    client: Arc<DeliveryClient>,
    replier: Arc<dyn ReplyGenerator>,
    config: ConversationConfig,
    country_code: String,
    /// Per-phone serialization locks.
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationEngine {
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        audit: Arc<dyn AuditLog>,
        client: Arc<DeliveryClient>,
        replier: Arc<dyn ReplyGenerator>,
        config: ConversationConfig,
        country_code: &str,
    ) -> Self {
        Self {
            contacts,
            audit,
            client,
            replier,
            config,
            country_code: country_code.to_string(),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, phone: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(phone.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Process one inbound message. Returns the contact's flow state
    /// after the transition.
    pub async fn handle_inbound(
        &self,
        phone: &str,
        text: &str,
        is_first_contact: bool,
    ) -> Result<FlowState> {
        let phone = phone::normalize(phone, &self.country_code)?;
        if text.trim().is_empty() {
            return Err(FrentistaError::Validation(
                "inbound text must not be empty".into(),
            ));
        }

        let lock = self.lock_for(&phone);
        let _serialized = lock.lock().await;

        self.audit
            .record_turn(&ConversationTurn::inbound(&phone, text))
            .await?;

        // One retry when a cross-process writer wins the race.
        match self.dispatch(&phone, text, is_first_contact).await {
            Err(FrentistaError::StateConflict(reason)) => {
                tracing::warn!("retrying {phone} after state conflict: {reason}");
                self.dispatch(&phone, text, is_first_contact).await
            }
            other => other,
        }
    }

    /// Operator command: close the dialogue with a farewell. The flow
    /// state is left unchanged.
    pub async fn end_conversation(&self, phone: &str) -> Result<()> {
        let phone = phone::normalize(phone, &self.country_code)?;
        let lock = self.lock_for(&phone);
        let _serialized = lock.lock().await;

        let contact = self.contacts.get(&phone).await?.ok_or_else(|| {
            FrentistaError::Validation(format!("no conversation with {phone}"))
        })?;

        let text = personalize(&self.config.farewell_text, contact.name.as_deref());
        let outcome = self.client.send(&phone, &text).await?;
        if outcome.success {
            self.record_outbound(&phone, &text).await?;
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        phone: &str,
        text: &str,
        is_first_contact: bool,
    ) -> Result<FlowState> {
        let contact = match self.contacts.get(phone).await? {
            Some(contact) => contact,
            None => {
                if !is_first_contact {
                    tracing::debug!("unknown contact {phone} without first-contact flag; creating");
                }
                let contact = Contact::new(phone);
                self.contacts.upsert(&contact).await?;
                contact
            }
        };

        match contact.flow_state {
            // A contact parked in WelcomeFailed gets another chance when
            // they write in themselves.
            FlowState::New | FlowState::WelcomeFailed => self.welcome(&contact).await,
            FlowState::AwaitingName => self.collect_name(&contact, text).await,
            FlowState::Completed => self.free_reply(&contact, text).await,
        }
    }

    async fn welcome(&self, contact: &Contact) -> Result<FlowState> {
        let text = self.config.welcome_text.clone();
        let outcome = self.client.send(&contact.phone, &text).await?;
        let next = if outcome.success {
            self.record_outbound(&contact.phone, &text).await?;
            FlowState::AwaitingName
        } else {
            tracing::warn!(
                "welcome to {} failed after {} attempts: {:?}",
                contact.phone,
                outcome.attempts,
                outcome.error
            );
            FlowState::WelcomeFailed
        };
        if next != contact.flow_state {
            self.contacts
                .update_state(&contact.phone, contact.flow_state, next, None)
                .await?;
        }
        Ok(next)
    }

    async fn collect_name(&self, contact: &Contact, inbound: &str) -> Result<FlowState> {
        match names::clean_name(inbound) {
            Some(name) => {
                // Name lands atomically with the transition into Completed.
                self.contacts
                    .update_state(
                        &contact.phone,
                        FlowState::AwaitingName,
                        FlowState::Completed,
                        Some(&name),
                    )
                    .await?;
                let reply = self
                    .generate(Some(&name), FlowState::AwaitingName, inbound, &contact.phone)
                    .await;
                self.send_reply(&contact.phone, &reply).await?;
                Ok(FlowState::Completed)
            }
            None => {
                let reply = self
                    .generate(None, FlowState::AwaitingName, inbound, &contact.phone)
                    .await;
                self.send_reply(&contact.phone, &reply).await?;
                Ok(FlowState::AwaitingName)
            }
        }
    }

    async fn free_reply(&self, contact: &Contact, inbound: &str) -> Result<FlowState> {
        let name = contact.name.clone().unwrap_or_default();
        let mut reply = self
            .generate(contact.name.as_deref(), FlowState::Completed, inbound, &contact.phone)
            .await;
        if !name.is_empty() && !reply.contains(&name) {
            reply = format!("{name}, {reply}");
        }
        self.send_reply(&contact.phone, &reply).await?;
        Ok(FlowState::Completed)
    }

    /// Reply text from the generator, or the configured fallback — a
    /// generator failure never reaches the contact.
    async fn generate(
        &self,
        name: Option<&str>,
        state: FlowState,
        inbound: &str,
        phone: &str,
    ) -> String {
        let history = self
            .audit
            .recent_turns(phone, self.config.history_window)
            .await
            .unwrap_or_default();
        match self.replier.reply(name, state, inbound, &history).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => self.config.fallback_reply.clone(),
            Err(e) => {
                tracing::warn!("reply generator failed for {phone}: {e}; using fallback");
                self.config.fallback_reply.clone()
            }
        }
    }

    async fn send_reply(&self, phone: &str, text: &str) -> Result<()> {
        let outcome = self.client.send(phone, text).await?;
        if outcome.success {
            self.record_outbound(phone, text).await?;
        }
        Ok(())
    }

    async fn record_outbound(&self, phone: &str, text: &str) -> Result<()> {
        self.audit
            .record_turn(&ConversationTurn::outbound(phone, text))
            .await
    }
}

/// Render `{name}` into a canned text, degrading gracefully when the
/// name is unknown ("Obrigado, {name}!" → "Obrigado!").
fn personalize(template_text: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => template::render(template_text, &[("name", name)]),
        None => template_text
            .replace(", {name}", "")
            .replace(" {name}", "")
            .replace("{name}", ""),
    }
}
