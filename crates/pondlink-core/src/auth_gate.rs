// ── Session gate ──
//
// Every write goes through `ensure_session` first. Concurrent callers that
// find no session queue on `creating`, so one sign-in is in flight at a time
// and late arrivals reuse its result.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AuthError, CoreError};
use crate::remote::{AuthProvider, Session};

pub struct AuthGate {
    provider: Arc<dyn AuthProvider>,
    creating: Mutex<()>,
}

impl AuthGate {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            creating: Mutex::new(()),
        }
    }

    /// Return the active session, creating an anonymous one if needed.
    ///
    /// A no-op while a session is active. On failure the caller must not
    /// proceed to any write.
    pub async fn ensure_session(&self) -> Result<Session, AuthError> {
        if let Some(session) = self.active_session() {
            return Ok(session);
        }

        let _creating = self.creating.lock().await;
        if let Some(session) = self.active_session() {
            debug!(uid = %session.uid, "session created by a concurrent caller");
            return Ok(session);
        }

        info!("no active session, signing in anonymously");
        match self.provider.sign_in_anonymously().await {
            Ok(session) => {
                debug!(uid = %session.uid, "anonymous session established");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "anonymous sign-in failed");
                Err(auth_error(e))
            }
        }
    }

    fn active_session(&self) -> Option<Session> {
        self.provider
            .current_session()
            .filter(|s| s.is_active_at(Utc::now()))
    }
}

fn auth_error(err: CoreError) -> AuthError {
    let message = match err {
        CoreError::AuthenticationFailed { message } => message,
        other => other.to_string(),
    };
    AuthError { message }
}
