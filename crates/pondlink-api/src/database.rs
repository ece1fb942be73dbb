// Realtime database REST client
//
// Wraps `reqwest::Client` with the database's URL scheme (`{base}/{path}.json`),
// token injection (`?auth=`), and status/error-body translation. The
// streaming side lives in `stream.rs` as further inherent methods.

use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::{TokenSlot, with_trailing_slash};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Error body the database sends with non-2xx responses: `{ "error": "..." }`.
#[derive(Debug, Deserialize)]
struct DatabaseErrorBody {
    error: String,
}

/// HTTP client for one realtime database instance.
///
/// Paths are slash-separated and relative to the database root
/// (`sensorData`, `devices/relay1`). Validation of path syntax belongs to
/// the caller; this client only builds URLs.
pub struct DatabaseClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    base_url: Url,
    tokens: TokenSlot,
}

impl DatabaseClient {
    /// Create a client for the database at `base_url`
    /// (e.g. `https://my-app-default-rtdb.firebaseio.com`).
    pub fn new(base_url: Url, tokens: TokenSlot, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            stream_http: transport.build_streaming_client()?,
            base_url: with_trailing_slash(base_url),
            tokens,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`, used for both
    /// request/response calls and streams.
    pub fn from_reqwest(base_url: &str, tokens: TokenSlot, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            stream_http: http.clone(),
            http,
            base_url: with_trailing_slash(Url::parse(base_url)?),
            tokens,
        })
    }

    /// The database root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The token slot consulted on every request.
    pub fn tokens(&self) -> &TokenSlot {
        &self.tokens
    }

    pub(crate) fn stream_http(&self) -> &reqwest::Client {
        &self.stream_http
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/{path}.json`, without credentials.
    pub(crate) fn path_url(&self, path: &str) -> Result<Url, Error> {
        let trimmed = path.trim_matches('/');
        Ok(self.base_url.join(&format!("{trimmed}.json"))?)
    }

    /// Append the current ID token, if any, as `?auth=`.
    pub(crate) fn authorize(tokens: &TokenSlot, mut url: Url) -> Url {
        if let Some(token) = tokens.get() {
            url.query_pairs_mut()
                .append_pair("auth", token.id_token.expose_secret());
        }
        url
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Read the value at `path`. A missing node reads as `None`.
    ///
    /// `GET {base}/{path}.json`
    pub async fn get(&self, path: &str) -> Result<Option<Value>, Error> {
        let url = Self::authorize(&self.tokens, self.path_url(path)?);
        debug!(path, "GET");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let body = read_body(resp, path).await?;

        match parse_json(&body)? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    /// Replace the value at `path`. Returns the value the server stored.
    ///
    /// `PUT {base}/{path}.json`
    pub async fn set(&self, path: &str, value: &Value) -> Result<Value, Error> {
        let url = Self::authorize(&self.tokens, self.path_url(path)?);
        debug!(path, "PUT");

        let resp = self
            .http
            .put(url)
            .json(value)
            .send()
            .await
            .map_err(Error::Transport)?;
        let body = read_body(resp, path).await?;
        parse_json(&body)
    }
}

/// Map the status line, returning the body text on success.
pub(crate) async fn read_body(resp: reqwest::Response, path: &str) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;
    check_status(status, &body, path)?;
    Ok(body)
}

pub(crate) fn check_status(status: reqwest::StatusCode, body: &str, path: &str) -> Result<(), Error> {
    if status.is_success() {
        return Ok(());
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::PermissionDenied { path: path.to_owned() });
    }
    let message = serde_json::from_str::<DatabaseErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_owned());
    Err(Error::Database {
        status: status.as_u16(),
        message,
    })
}

fn parse_json(body: &str) -> Result<Value, Error> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}
