// ── Core error types ──
//
// User-facing errors from pondlink-core. Consumers never see HTTP status
// codes or JSON parse failures directly: the `From<pondlink_api::Error>`
// impl translates transport-layer errors into domain-appropriate variants.
//
// The read path (`SyncError`) and the write path (`AuthError`,
// `CommandError`) carry their own small, cloneable error types because they
// end up stored inside published state.

use thiserror::Error;

use crate::model::RelayMessage;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Permission denied at '{path}'")]
    PermissionDenied { path: String },

    // ── Usage errors ─────────────────────────────────────────────────
    #[error("Invalid store path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("A telemetry subscription is already live")]
    AlreadySubscribed,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Database error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pondlink_api::Error> for CoreError {
    fn from(err: pondlink_api::Error) -> Self {
        match err {
            pondlink_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            pondlink_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            pondlink_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), |u| u.origin().ascii_serialization()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            pondlink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            pondlink_api::Error::PermissionDenied { path } => CoreError::PermissionDenied { path },
            pondlink_api::Error::Database { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            pondlink_api::Error::Stream(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("event stream: {reason}"),
            },
            pondlink_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

// ── Read path ────────────────────────────────────────────────────────

/// Why a telemetry update did not produce a snapshot.
///
/// The `Display` text is what ends up in `ConnectionState::error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Transport or permission failure on the subscription.
    #[error("{message}")]
    Transport { message: String },

    /// The path exists but holds no payload. Indistinguishable from lost
    /// connectivity at this layer, so it is reported, not rendered as zeros.
    #[error("No data available")]
    EmptyData,
}

impl From<&CoreError> for SyncError {
    fn from(err: &CoreError) -> Self {
        SyncError::Transport {
            message: err.to_string(),
        }
    }
}

// ── Write path ───────────────────────────────────────────────────────

/// Session establishment failed. No write may follow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Authentication failed: {message}")]
pub struct AuthError {
    pub message: String,
}

/// Coarse classification of [`CommandError`] for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandErrorKind {
    Unauthenticated,
    Busy,
    Write,
    ReadBack,
    Mismatch,
}

/// Why a relay command did not confirm.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Not authenticated: {0}")]
    Unauthenticated(#[source] AuthError),

    #[error("Channel {channel} already has a command in flight")]
    Busy { channel: u32 },

    #[error("Write to '{path}' failed: {message}")]
    Write { path: String, message: String },

    #[error("Read-back of '{path}' failed: {message}")]
    ReadBack { path: String, message: String },

    #[error("Relay did not confirm: expected {expected}, observed {}", .observed.map_or("nothing", RelayMessage::as_str))]
    Mismatch {
        expected: RelayMessage,
        observed: Option<RelayMessage>,
    },
}

impl CommandError {
    pub fn kind(&self) -> CommandErrorKind {
        match self {
            Self::Unauthenticated(_) => CommandErrorKind::Unauthenticated,
            Self::Busy { .. } => CommandErrorKind::Busy,
            Self::Write { .. } => CommandErrorKind::Write,
            Self::ReadBack { .. } => CommandErrorKind::ReadBack,
            Self::Mismatch { .. } => CommandErrorKind::Mismatch,
        }
    }
}
