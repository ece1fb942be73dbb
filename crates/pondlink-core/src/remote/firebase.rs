// Adapters from the `pondlink-api` HTTP clients to the core traits.

use std::sync::Arc;

use async_trait::async_trait;
use pondlink_api::{DatabaseClient, IdentityClient, ReconnectConfig, StreamEvent};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{AuthProvider, Listener, RealtimeStore, RemoteEvent, Session, StorePath};
use crate::error::CoreError;

/// [`RealtimeStore`] over the database's REST and event-stream endpoints.
pub struct FirebaseStore {
    db: Arc<DatabaseClient>,
    reconnect: ReconnectConfig,
}

impl FirebaseStore {
    pub fn new(db: DatabaseClient, reconnect: ReconnectConfig) -> Self {
        Self {
            db: Arc::new(db),
            reconnect,
        }
    }
}

#[async_trait]
impl RealtimeStore for FirebaseStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, CoreError> {
        Ok(self.db.get(path.as_str()).await?)
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), CoreError> {
        self.db.set(path.as_str(), &value).await?;
        Ok(())
    }

    fn listen(&self, path: &StorePath) -> Result<Listener, CoreError> {
        let token = CancellationToken::new();
        let mut stream = self
            .db
            .listen(path.as_str(), self.reconnect.clone(), token.clone())?;
        let (tx, rx) = mpsc::unbounded_channel();

        let cancel = token.clone();
        let label = path.to_string();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    event = stream.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let forwarded = match event {
                    StreamEvent::Value(value) => RemoteEvent::Value(Some(value).filter(|v| !v.is_null())),
                    StreamEvent::Error(e) => RemoteEvent::Error(e.into()),
                };
                if tx.send(forwarded).is_err() {
                    break;
                }
            }
            debug!(path = %label, "listener forwarder stopped");
        });

        Ok(Listener::new(rx, token))
    }
}

/// [`AuthProvider`] over the identity endpoint's anonymous sign-up.
///
/// Once a session exists, later sign-ins refresh it so the anonymous user
/// survives token expiry; a fresh account is only created when the refresh
/// is refused.
pub struct FirebaseAuth {
    identity: IdentityClient,
}

impl FirebaseAuth {
    pub fn new(identity: IdentityClient) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl AuthProvider for FirebaseAuth {
    fn current_session(&self) -> Option<Session> {
        self.identity.tokens().get().map(|token| Session {
            uid: token.uid.clone(),
            expires_at: token.expires_at,
        })
    }

    async fn sign_in_anonymously(&self) -> Result<Session, CoreError> {
        let held = self.identity.tokens().get();
        if let Some(refresh_token) = held.as_ref().and_then(|t| t.refresh_token.as_ref()) {
            match self.identity.refresh(refresh_token).await {
                Ok(token) => {
                    return Ok(Session {
                        uid: token.uid,
                        expires_at: token.expires_at,
                    });
                }
                Err(e) => warn!(error = %e, "session refresh failed, signing up again"),
            }
        }

        let token = self.identity.sign_up_anonymously().await?;
        Ok(Session {
            uid: token.uid,
            expires_at: token.expires_at,
        })
    }
}
