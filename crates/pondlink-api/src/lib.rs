// pondlink-api: Async Rust client for a Firebase-style realtime database
// (REST + event stream) and its anonymous identity endpoint.

pub mod auth;
pub mod database;
pub mod error;
pub mod stream;
pub mod transport;

pub use auth::{IdentityClient, IssuedToken, TokenSlot};
pub use database::DatabaseClient;
pub use error::Error;
pub use stream::{ReconnectConfig, StreamEvent};
pub use transport::TransportConfig;
