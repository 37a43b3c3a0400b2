//! Retrying delivery client.
//!
//! Centralizes the retry/backoff/classification logic that both the
//! campaign dispatcher and the conversation engine need, so neither call
//! site grows its own. Ordinary provider failures never surface as `Err`
//! — the returned `SendOutcome` carries success, transience, and the
//! attempt count, and every terminal outcome lands in the audit log
//! exactly once.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::Utc;
use frentista_core::config::MessagingConfig;
use frentista_core::error::{FrentistaError, Result};
use frentista_core::traits::{AuditLog, SendTransport, TransportError};
use frentista_core::types::{AttemptOutcome, DeliveryAttempt};

use crate::wait::interruptible_sleep;

/// Error substrings the provider or the socket layer emits for failures
/// worth retrying.
const TRANSIENT_PATTERNS: &[&str] = &[
    "connection reset",
    "connection closed",
    "socket closed",
    "broken pipe",
    "timed out",
    "timeout",
];

const TRANSIENT_STATUS: &[u16] = &[500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub send_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(2000),
            send_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&MessagingConfig> for DeliveryConfig {
    fn from(cfg: &MessagingConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            backoff_base: cfg.backoff_base(),
            send_timeout: cfg.send_timeout(),
        }
    }
}

/// Terminal result of one delivery, after retries.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    /// Whether the final failure was classified transient.
    pub transient: bool,
    pub attempts: u32,
}

pub struct DeliveryClient {
    transport: Arc<dyn SendTransport>,
    audit: Arc<dyn AuditLog>,
    config: DeliveryConfig,
}

fn is_transient(err: &TransportError) -> bool {
    if let Some(status) = err.status
        && TRANSIENT_STATUS.contains(&status)
    {
        return true;
    }
    let msg = err.message.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| msg.contains(p))
}

impl DeliveryClient {
    pub fn new(
        transport: Arc<dyn SendTransport>,
        audit: Arc<dyn AuditLog>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            transport,
            audit,
            config,
        }
    }

    /// Send one message, retrying transient failures with exponential
    /// backoff (base, 2×base, 4×base…).
    pub async fn send(&self, phone: &str, text: &str) -> Result<SendOutcome> {
        self.send_with_cancel(phone, text, None).await
    }

    /// Like [`send`](Self::send), but the backoff waits observe `cancel`.
    /// A cancellation during backoff abandons the remaining retries and
    /// records the failure so far as the terminal outcome — the in-flight
    /// attempt itself is never interrupted.
    pub async fn send_with_cancel(
        &self,
        phone: &str,
        text: &str,
        cancel: Option<&AtomicBool>,
    ) -> Result<SendOutcome> {
        if phone.trim().is_empty() {
            return Err(FrentistaError::Validation("phone must not be empty".into()));
        }
        if text.trim().is_empty() {
            return Err(FrentistaError::Validation(
                "message text must not be empty".into(),
            ));
        }

        let mut attempts = 0u32;
        let mut last_error: Option<TransportError> = None;
        let mut last_transient = false;

        while attempts < self.config.max_retries {
            attempts += 1;

            let call = self.transport.send(phone, text);
            let failure = match tokio::time::timeout(self.config.send_timeout, call).await {
                Ok(Ok(receipt)) => {
                    let outcome = SendOutcome {
                        success: true,
                        provider_message_id: receipt.message_id,
                        error: None,
                        transient: false,
                        attempts,
                    };
                    self.record(phone, text, &outcome).await?;
                    tracing::info!("message sent to {phone} on attempt {attempts}");
                    return Ok(outcome);
                }
                Ok(Err(err)) => err,
                Err(_) => TransportError {
                    status: None,
                    message: format!(
                        "send timed out after {}s",
                        self.config.send_timeout.as_secs()
                    ),
                },
            };

            let transient = is_transient(&failure);
            tracing::warn!(
                "send attempt {attempts}/{} to {phone} failed ({}): {failure}",
                self.config.max_retries,
                if transient { "transient" } else { "permanent" },
            );
            last_transient = transient;
            last_error = Some(failure);

            if !transient {
                break;
            }
            if attempts < self.config.max_retries {
                let backoff = self.config.backoff_base * 2u32.pow(attempts - 1);
                if !interruptible_sleep(backoff, cancel).await {
                    tracing::info!("delivery to {phone} cancelled during backoff");
                    break;
                }
            }
        }

        let outcome = SendOutcome {
            success: false,
            provider_message_id: None,
            error: last_error.map(|e| e.to_string()),
            transient: last_transient,
            attempts,
        };
        self.record(phone, text, &outcome).await?;
        Ok(outcome)
    }

    async fn record(&self, phone: &str, payload: &str, outcome: &SendOutcome) -> Result<()> {
        let attempt = DeliveryAttempt {
            phone: phone.to_string(),
            payload: payload.to_string(),
            attempts: outcome.attempts,
            outcome: if outcome.success {
                AttemptOutcome::Sent
            } else {
                AttemptOutcome::Failed
            },
            transient: outcome.transient,
            provider_message_id: outcome.provider_message_id.clone(),
            error: outcome.error.clone(),
            timestamp: Utc::now(),
        };
        self.audit.record_attempt(&attempt).await
    }
}
