use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use super::request_id::RequestId;
use crate::api::envelope;
use crate::auth::IdentityError;
use crate::error::ApiError;
use crate::state::AppState;

/// Resolves the bearer credential to a [`crate::auth::Principal`] and injects
/// it into the request. The token itself is only ever handed to the identity
/// provider, never interpreted here.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0)
        .unwrap_or_else(Uuid::new_v4);

    let token = match extract_bearer(request.headers()) {
        Ok(token) => token,
        Err(msg) => return envelope::failure(request_id, &ApiError::unauthorized(msg)),
    };

    match state.identity.resolve(&token).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(IdentityError::InvalidToken(reason)) => {
            tracing::warn!(%request_id, %reason, "credential rejected");
            envelope::failure(request_id, &ApiError::unauthorized("Invalid credential"))
        }
        Err(IdentityError::ProviderUnavailable(reason)) => {
            tracing::error!(%request_id, %reason, "identity provider unavailable");
            envelope::failure(request_id, &ApiError::InternalError)
        }
    }
}

/// Extract the bearer token from the Authorization header.
fn extract_bearer(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty bearer token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
