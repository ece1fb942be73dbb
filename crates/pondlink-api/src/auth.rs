// Anonymous identity sign-up
//
// The realtime database's security rules require an authenticated caller
// before writes. The identity endpoint hands out anonymous users; the ID
// token it returns is parked in a `TokenSlot` that the database client reads
// on every request. Expired tokens are exchanged for fresh ones through the
// refresh token, keeping the same anonymous user.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/";
const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/";

/// An ID token issued by the identity endpoint.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Stable user id of the (anonymous) account.
    pub uid: String,
    /// Bearer token sent to the database as `?auth=`.
    pub id_token: SecretString,
    /// When the token stops being accepted, if the server said so.
    pub expires_at: Option<DateTime<Utc>>,
    /// Long-lived credential that mints new ID tokens for `uid`.
    pub refresh_token: Option<SecretString>,
}

impl IssuedToken {
    /// Whether the token is still usable at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Shared cell holding the current ID token.
///
/// Written by [`IdentityClient`], read by the database client. Cloning the
/// slot shares the same cell.
#[derive(Debug, Clone, Default)]
pub struct TokenSlot {
    inner: Arc<ArcSwapOption<IssuedToken>>,
}

impl TokenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current token, if one was issued.
    pub fn get(&self) -> Option<Arc<IssuedToken>> {
        self.inner.load_full()
    }

    pub fn set(&self, token: IssuedToken) {
        self.inner.store(Some(Arc::new(token)));
    }

    pub fn clear(&self) {
        self.inner.store(None);
    }
}

/// Successful `accounts:signUp` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: String,
    local_id: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Lifetime in seconds, sent as a string.
    #[serde(default)]
    expires_in: Option<String>,
}

/// Successful `v1/token` response body. This endpoint answers in snake_case.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    user_id: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

/// Error envelope: `{ "error": { "code": 400, "message": "..." } }`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the identity endpoint.
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: Url,
    token_url: Url,
    api_key: SecretString,
    tokens: TokenSlot,
}

impl IdentityClient {
    /// Create a client. `base_url` defaults to the public identity endpoint;
    /// an override (an emulator) serves token refresh from the same base.
    pub fn new(
        api_key: SecretString,
        base_url: Option<Url>,
        tokens: TokenSlot,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let (base_url, token_url) = match base_url {
            Some(url) => (url.clone(), url),
            None => (Url::parse(DEFAULT_IDENTITY_URL)?, Url::parse(DEFAULT_TOKEN_URL)?),
        };
        Ok(Self {
            http: transport.build_client()?,
            base_url: with_trailing_slash(base_url),
            token_url: with_trailing_slash(token_url),
            api_key,
            tokens,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn from_reqwest(
        base_url: &str,
        api_key: SecretString,
        tokens: TokenSlot,
        http: reqwest::Client,
    ) -> Result<Self, Error> {
        let base_url = with_trailing_slash(Url::parse(base_url)?);
        Ok(Self {
            http,
            token_url: base_url.clone(),
            base_url,
            api_key,
            tokens,
        })
    }

    /// The slot this client writes issued tokens into.
    pub fn tokens(&self) -> &TokenSlot {
        &self.tokens
    }

    /// Create a new anonymous account and store its ID token.
    ///
    /// `POST {base}/v1/accounts:signUp?key={api_key}`
    pub async fn sign_up_anonymously(&self) -> Result<IssuedToken, Error> {
        let url = self.keyed(&self.base_url, "v1/accounts:signUp")?;
        debug!(host = ?self.base_url.host_str(), "requesting anonymous session");

        let request = self.http.post(url).json(&json!({ "returnSecureToken": true }));
        let parsed: SignUpResponse = Self::exchange(request).await?;

        let token = IssuedToken {
            uid: parsed.local_id,
            id_token: SecretString::from(parsed.id_token),
            expires_at: expiry(parsed.expires_in.as_deref()),
            refresh_token: parsed.refresh_token.map(SecretString::from),
        };
        self.tokens.set(token.clone());
        debug!(uid = %token.uid, "anonymous session issued");
        Ok(token)
    }

    /// Trade a refresh token for a new ID token of the same user and store it.
    ///
    /// `POST {token_base}/v1/token?key={api_key}`, form-encoded.
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<IssuedToken, Error> {
        let url = self.keyed(&self.token_url, "v1/token")?;
        debug!(host = ?self.token_url.host_str(), "refreshing session");

        let request = self.http.post(url).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
        ]);
        let parsed: RefreshResponse = Self::exchange(request).await?;

        // The server may rotate the refresh token; keep the old one otherwise.
        let refresh_token = match parsed.refresh_token {
            Some(rotated) => SecretString::from(rotated),
            None => refresh_token.clone(),
        };
        let token = IssuedToken {
            uid: parsed.user_id,
            id_token: SecretString::from(parsed.id_token),
            expires_at: expiry(parsed.expires_in.as_deref()),
            refresh_token: Some(refresh_token),
        };
        self.tokens.set(token.clone());
        debug!(uid = %token.uid, "session refreshed");
        Ok(token)
    }

    fn keyed(&self, base: &Url, endpoint: &str) -> Result<Url, Error> {
        let mut url = base.join(endpoint)?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());
        Ok(url)
    }

    async fn exchange<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, Error> {
        let resp = request.send().await.map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            return Err(Error::Authentication { message });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Lifetimes arrive as a string count of seconds.
fn expiry(expires_in: Option<&str>) -> Option<DateTime<Utc>> {
    expires_in
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

/// `Url::join` replaces the last segment unless the base ends in `/`.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
