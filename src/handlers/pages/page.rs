use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::Page;

/// GET /api/pages/:name - current state of one page
pub async fn get(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<Page>> {
    state
        .provider
        .get_page(&name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Page '{}' not found", name)))
}

/// DELETE /api/pages/:name - remove a page and its history
pub async fn delete(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    state.provider.delete_page(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
