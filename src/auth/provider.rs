use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use super::{IdentityError, Principal};

/// Resolves a bearer credential to a [`Principal`].
///
/// Credential verification belongs to the external identity provider; this
/// layer never parses or validates the token itself.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, bearer: &str) -> Result<Principal, IdentityError>;
}

/// Token-introspection client against the identity provider's
/// `/oauth/introspect` endpoint (RFC 7662 shape).
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    is_global_admin: bool,
    #[serde(flatten)]
    claims: Map<String, Value>,
}

impl HttpIdentityProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::ProviderUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, bearer: &str) -> Result<Principal, IdentityError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("token", bearer)])
            .send()
            .await
            .map_err(|e| IdentityError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::ProviderUnavailable(format!(
                "introspection returned {}",
                response.status()
            )));
        }

        let body: IntrospectionResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::ProviderUnavailable(e.to_string()))?;

        if !body.active {
            return Err(IdentityError::InvalidToken("token is not active".into()));
        }
        let sub = body
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IdentityError::InvalidToken("token has no subject".into()))?;

        Ok(Principal {
            id: sub,
            is_global_admin: body.is_global_admin,
            claims: body.claims,
        })
    }
}

/// Fixed token → principal table. Development and test harness provider.
#[derive(Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, Principal>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, bearer: &str) -> Result<Principal, IdentityError> {
        self.tokens
            .get(bearer)
            .cloned()
            .ok_or_else(|| IdentityError::InvalidToken("unknown token".into()))
    }
}
