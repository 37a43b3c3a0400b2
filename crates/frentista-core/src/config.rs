//! Frentista configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FrentistaError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrentistaConfig {
    /// Fixed country prefix for the numbering plan (digits only).
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_country_code() -> String { "55".into() }

impl Default for FrentistaConfig {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            provider: ProviderConfig::default(),
            messaging: MessagingConfig::default(),
            conversation: ConversationConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl FrentistaConfig {
    /// Load config from the default path (~/.frentista/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FrentistaError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FrentistaError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| FrentistaError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the frentista home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".frentista")
    }

    /// Resolved data directory for databases and campaign snapshots.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(Self::home_dir)
    }
}

/// Provider send API configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// Base URL of the send API, e.g. "https://api.example.com/v1".
    #[serde(default)]
    pub api_url: String,
    /// Bearer token.
    #[serde(default)]
    pub access_token: String,
    /// Sender account id, informational only.
    #[serde(default)]
    pub sender_id: String,
}

/// Pacing, rate budget, and retry tuning for outbound sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Hourly send cap shared across all campaigns on one account.
    #[serde(default = "default_max_per_hour")]
    pub max_messages_per_hour: u32,
    /// Between-contact delay range, seconds.
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
    /// Chat-opening simulation range, seconds.
    #[serde(default = "default_open_min")]
    pub open_delay_min_secs: u64,
    #[serde(default = "default_open_max")]
    pub open_delay_max_secs: u64,
    /// Typing simulation range, seconds.
    #[serde(default = "default_type_min")]
    pub type_delay_min_secs: u64,
    #[serde(default = "default_type_max")]
    pub type_delay_max_secs: u64,
    /// Attempts per message before giving up on transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Exponential backoff base, milliseconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    /// Per-attempt provider timeout, seconds.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_max_per_hour() -> u32 { 40 }
fn default_min_delay() -> u64 { 25 }
fn default_max_delay() -> u64 { 70 }
fn default_open_min() -> u64 { 6 }
fn default_open_max() -> u64 { 12 }
fn default_type_min() -> u64 { 2 }
fn default_type_max() -> u64 { 4 }
fn default_max_retries() -> u32 { 3 }
fn default_backoff_base() -> u64 { 2000 }
fn default_send_timeout() -> u64 { 30 }

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            max_messages_per_hour: default_max_per_hour(),
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
            open_delay_min_secs: default_open_min(),
            open_delay_max_secs: default_open_max(),
            type_delay_min_secs: default_type_min(),
            type_delay_max_secs: default_type_max(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

impl MessagingConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn open_delay(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.open_delay_min_secs),
            Duration::from_secs(self.open_delay_max_secs),
        )
    }

    pub fn type_delay(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.type_delay_min_secs),
            Duration::from_secs(self.type_delay_max_secs),
        )
    }

    pub fn send_delay(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.min_delay_secs),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

/// Canned texts for the onboarding dialogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_welcome")]
    pub welcome_text: String,
    #[serde(default = "default_farewell")]
    pub farewell_text: String,
    /// Sent when the reply generator fails.
    #[serde(default = "default_fallback")]
    pub fallback_reply: String,
    /// How many recent turns the reply generator sees.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_welcome() -> String {
    "Olá! Aqui é o atendimento do posto. Como podemos te chamar?".into()
}
fn default_farewell() -> String {
    "Obrigado pelo contato, {name}! Qualquer coisa é só chamar.".into()
}
fn default_fallback() -> String {
    "Desculpe, não consegui processar sua mensagem agora. Pode tentar de novo em instantes?".into()
}
fn default_history_window() -> usize { 10 }

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            welcome_text: default_welcome(),
            farewell_text: default_farewell(),
            fallback_reply: default_fallback(),
            history_window: default_history_window(),
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Overrides ~/.frentista when set.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}
