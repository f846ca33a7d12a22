//! Application-wide error types.
//!
//! Every failure a caller can observe is one [`TenderError`].  Presentation
//! code should branch on [`TenderError::kind`] rather than on variants.

use serde::Serialize;
use thiserror::Error;

use crate::types::NetworkId;

#[derive(Debug, Error)]
pub enum TenderError {
    // ── Caught before any network call ───────────────────
    #[error("Invalid input: {0}")]
    Validation(String),

    // ── Blocking preconditions ───────────────────────────
    #[error("Wallet is not connected")]
    Disconnected,

    #[error("Unsupported network {actual}; switch to one of {supported:?}")]
    WrongNetwork {
        actual: NetworkId,
        supported: Vec<NetworkId>,
    },

    #[error("Session is no longer current (account or network changed)")]
    SessionExpired,

    #[error("A write from this form is still pending confirmation")]
    FormBusy,

    // ── Ledger outcomes ──────────────────────────────────
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    #[error("Rejected by ledger: {0}")]
    Rejected(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Signing request was declined")]
    Cancelled,

    #[error("Temporarily unavailable: {0}")]
    Unavailable(String),

    // ── Infrastructure ───────────────────────────────────
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed ledger response: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TenderError>;

/// Coarse classification used to pick how a failure is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input; shown inline next to the field.
    Validation,
    /// Role or simulation refused the caller.
    NotPermitted,
    /// Read/fetch failed after its retry; a manual retry is offered.
    Transient,
    /// Reverted write or non-authorization rejection; shown verbatim.
    Terminal,
    /// The user declined to sign. Not an error.
    Cancelled,
    /// Wallet missing, wrong network, stale session or busy form.
    Precondition,
}

impl TenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotPermitted(_) => ErrorKind::NotPermitted,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Disconnected | Self::WrongNetwork { .. } | Self::SessionExpired | Self::FormBusy => {
                ErrorKind::Precondition
            }
            Self::Unavailable(_) | Self::Timeout(_) | Self::Http(_) => ErrorKind::Transient,
            Self::Rpc { .. } if self.is_transient() => ErrorKind::Transient,
            Self::Rejected(_)
            | Self::Reverted(_)
            | Self::Rpc { .. }
            | Self::Decode(_)
            | Self::Database(_)
            | Self::Migrate(_)
            | Self::Json(_)
            | Self::Config(_) => ErrorKind::Terminal,
        }
    }

    /// Whether a read that failed this way may be issued once more.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Unavailable(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            // Only the server-error range and rate limiting heal; a revert is
            // deterministic even when a node reports it as -32000.
            Self::Rpc { code, message } => {
                *code == 429
                    || ((-32099..=-32000).contains(code)
                        && !message.to_ascii_lowercase().contains("revert"))
            }
            _ => false,
        }
    }
}
