use thiserror::Error;

/// Top-level error type for the `pondlink-api` crate.
///
/// Covers every failure mode of the two remote surfaces: the identity
/// endpoint (anonymous sign-up) and the realtime database (REST + stream).
/// `pondlink-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Identity ────────────────────────────────────────────────────
    /// Anonymous sign-up was rejected by the identity provider
    /// (anonymous auth disabled, bad API key, quota, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The ID token used for the stream was revoked or expired.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Database ────────────────────────────────────────────────────
    /// Security rules refused the read or write.
    #[error("Permission denied at '{path}'")]
    PermissionDenied { path: String },

    /// Non-success status from the database with its `error` message.
    #[error("Database error (HTTP {status}): {message}")]
    Database { status: u16, message: String },

    // ── Streaming ───────────────────────────────────────────────────
    /// The event stream delivered something we cannot interpret.
    #[error("Event stream error: {0}")]
    Stream(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::Database { status, .. } => *status >= 500,
            Self::Stream(_) => true,
            _ => false,
        }
    }
}
