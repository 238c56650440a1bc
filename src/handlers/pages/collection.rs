use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::{validate_page_name, Page};

/// GET /api/pages - all current pages
pub async fn get(State(state): State<AppState>) -> ApiResult<Json<Vec<Page>>> {
    Ok(Json(state.provider.list_pages().await?))
}

/// POST /api/pages - create or update a page, echoing it back
pub async fn post(State(state): State<AppState>, body: Result<Json<Page>, JsonRejection>) -> ApiResult<Json<Page>> {
    let Json(page) = body.map_err(|rejection| ApiError::invalid_json(rejection.body_text()))?;

    validate_page_name(page.name()).map_err(|msg| ApiError::field_error("metadata.name", msg))?;

    Ok(Json(state.provider.save_page(page).await?))
}
