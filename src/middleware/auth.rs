use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;

/// Verify the bearer token and attach the caller as [`AuthUser`].
///
/// Preflight requests pass untouched, as does everything when
/// authentication is disabled.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(auth) = state.auth.as_ref() else {
        return Ok(next.run(request).await);
    };
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing or invalid Authorization header"))?;

    let claims = auth.verifier.verify(token).await.map_err(|e| {
        tracing::debug!("Token rejected: {}", e);
        ApiError::unauthorized("Invalid or expired JWT token")
    })?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
