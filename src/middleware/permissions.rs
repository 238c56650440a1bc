use axum::{
    extract::{Path, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;

/// Check that the caller may modify the page named in the path.
///
/// Reads are open to any authenticated caller. Routes without a page
/// name (creating through `POST /api/pages`) are not checked.
pub async fn require_page_access(
    State(state): State<AppState>,
    params: Option<Path<HashMap<String, String>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(auth) = state.auth.as_ref() else {
        return Ok(next.run(request).await);
    };
    if request.method() == Method::GET || request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let Some(page) = params.as_ref().and_then(|Path(params)| params.get("name")) else {
        return Ok(next.run(request).await);
    };

    if !auth.permissions.can_access_page(page, &user.sub).await {
        tracing::warn!("Permission denied: {} on page '{}'", user.sub, page);
        return Err(ApiError::forbidden("Insufficient permissions for this page"));
    }

    Ok(next.run(request).await)
}
