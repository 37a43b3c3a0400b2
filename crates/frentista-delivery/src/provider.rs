//! HTTP transport for the provider send API.
//!
//! One endpoint matters: `POST {api_url}/send {number, text}` with bearer
//! auth, answering `{ok, messageId?}`. Anything non-2xx (or `ok: false`)
//! surfaces as a `TransportError` for the delivery client to classify.

use async_trait::async_trait;
use frentista_core::config::ProviderConfig;
use frentista_core::error::{FrentistaError, Result};
use frentista_core::traits::{ProviderReceipt, SendTransport, TransportError};

pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl HttpTransport {
    /// Builds the transport, validating credentials up front so a
    /// misconfigured account short-circuits before any attempt is made.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        if config.access_token.is_empty() {
            return Err(FrentistaError::Config(
                "provider access_token not configured".into(),
            ));
        }
        if config.api_url.is_empty() {
            return Err(FrentistaError::Config(
                "provider api_url not configured".into(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }
}

#[async_trait]
impl SendTransport for HttpTransport {
    async fn send(
        &self,
        phone: &str,
        text: &str,
    ) -> std::result::Result<ProviderReceipt, TransportError> {
        let url = format!("{}/send", self.api_url);
        let body = serde_json::json!({
            "number": phone,
            "text": text,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError {
                status: None,
                message: format!("provider request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError {
                status: Some(status.as_u16()),
                message: format!("provider error {status}: {error_text}"),
            });
        }

        let result: serde_json::Value = response.json().await.map_err(|e| TransportError {
            status: None,
            message: format!("invalid provider response: {e}"),
        })?;

        if !result["ok"].as_bool().unwrap_or(false) {
            return Err(TransportError {
                status: None,
                message: format!(
                    "provider rejected message: {}",
                    result["error"].as_str().unwrap_or("unknown")
                ),
            });
        }

        let message_id = result["messageId"].as_str().map(String::from);
        tracing::debug!("provider accepted message {:?} → {}", message_id, phone);
        Ok(ProviderReceipt { message_id })
    }
}
