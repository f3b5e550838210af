pub mod provider;

use serde_json::{Map, Value};

pub use provider::{HttpIdentityProvider, IdentityProvider, StaticIdentityProvider};

/// The authenticated identity behind a request.
///
/// Produced once per request by the identity provider and immutable from then
/// on. Never persisted by this layer.
#[derive(Clone, Debug)]
pub struct Principal {
    pub id: String,
    /// Flagged by the identity provider, independent of any tenant role
    /// binding. Bypasses the permission matrix.
    pub is_global_admin: bool,
    pub claims: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid credential: {0}")]
    InvalidToken(String),
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
}
