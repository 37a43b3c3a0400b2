//! Error types shared across the frentista workspace.
//!
//! Ordinary provider failures (timeouts, 5xx, bad numbers) are NOT errors
//! here — the delivery client reports them through `SendOutcome` so callers
//! can classify and record them. `FrentistaError` covers the conditions
//! that abort an operation outright.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FrentistaError>;

#[derive(Debug, Error)]
pub enum FrentistaError {
    /// Missing or malformed configuration (credentials, paths).
    #[error("Config error: {0}")]
    Config(String),

    /// Input rejected before any side effect (empty phone/text/target list).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport-level failure that is not an ordinary provider response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A checkpoint could not be written. Fatal to the current run —
    /// continuing could cause a duplicate send on resume.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A per-phone transition lost a race; the caller retries after
    /// acquiring the serialization primitive.
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Reply generation failed upstream of the static fallback.
    #[error("Reply generator error: {0}")]
    Reply(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
