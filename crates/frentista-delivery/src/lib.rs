//! Delivery layer — the single send path for campaigns and conversations.

pub mod client;
pub mod provider;
pub mod wait;

pub use client::{DeliveryClient, DeliveryConfig, SendOutcome};
pub use provider::HttpTransport;
