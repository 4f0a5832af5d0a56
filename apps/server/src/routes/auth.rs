//! Authentication middleware
//!
//! Two trust levels: the verifier (identity gateway and reward worker)
//! authenticates with a shared secret; players authenticate with the
//! connection id the verifier bound to them via `create_session`. A player
//! id supplied by the client is never accepted anywhere.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::AppState;

/// Verified caller identity stored in request extensions.
#[derive(Clone, Debug)]
pub struct AuthenticatedPlayer {
    pub connection_id: Uuid,
    pub player_id: String,
}

fn bearer_token(request: &Request<Body>) -> Result<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthenticated("missing bearer token".to_string()))
}

/// Session middleware - resolves the caller through its bound session.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(&request)?;
    let connection_id = Uuid::parse_str(token)
        .map_err(|_| ApiError::Unauthenticated("malformed session token".to_string()))?;

    let player_id = state
        .world()
        .player_id_for_connection(&connection_id)
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::Unauthenticated("no session for this connection".to_string())
        })?;

    request
        .extensions_mut()
        .insert(AuthenticatedPlayer { connection_id, player_id });

    Ok(next.run(request).await)
}

/// Verifier middleware - shared-secret check for the gateway and worker.
pub async fn verifier_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(&request)?;
    if token != state.config.verifier_token {
        return Err(ApiError::Unauthenticated("verifier token required".to_string()));
    }
    Ok(next.run(request).await)
}
