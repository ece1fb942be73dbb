// Shared transport configuration for building reqwest::Client instances.
//
// The identity and database clients share timeout and user-agent settings
// through this module. Streaming connections get their own client because a
// total request timeout would kill a long-lived event stream.

use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("pondlink/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Total timeout for request/response calls.
    pub timeout: Duration,
    /// Timeout for establishing a TCP/TLS connection (all clients).
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` for request/response calls.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(Error::Transport)
    }

    /// Build a `reqwest::Client` for long-lived event streams.
    ///
    /// Only the connect phase is bounded; the body may stay open forever.
    pub fn build_streaming_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(Error::Transport)
    }
}
