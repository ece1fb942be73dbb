// ── Runtime connection configuration ──
//
// Describes *where* the telemetry and relays live and how to reach them.
// Carries credential data but never touches disk: the CLI builds a
// `DashboardConfig` from its profile and hands it in.

use std::time::Duration;

use pondlink_api::ReconnectConfig;
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;
use crate::remote::StorePath;

/// Default telemetry node.
pub const DEFAULT_TELEMETRY_PATH: &str = "sensorData";

/// Stream reconnection policy. Retrying is the transport's job, not the core's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl From<&ReconnectPolicy> for ReconnectConfig {
    fn from(policy: &ReconnectPolicy) -> Self {
        ReconnectConfig {
            initial_delay: policy.initial_delay,
            max_delay: policy.max_delay,
            max_retries: policy.max_retries,
        }
    }
}

/// Configuration for one dashboard mount.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Database root, e.g. `https://pond-default-rtdb.firebaseio.com`.
    pub database_url: Url,
    /// Web API key used for anonymous sign-up.
    pub api_key: SecretString,
    /// Identity endpoint override (emulator). `None` uses the public one.
    pub identity_url: Option<Url>,
    pub telemetry_path: StorePath,
    /// Per-request timeout for reads and writes.
    pub timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl DashboardConfig {
    pub fn new(database_url: Url, api_key: SecretString) -> Result<Self, CoreError> {
        Ok(Self {
            database_url,
            api_key,
            identity_url: None,
            telemetry_path: StorePath::new(DEFAULT_TELEMETRY_PATH)?,
            timeout: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
        })
    }
}
