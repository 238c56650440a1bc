use axum::{
    extract::{Path, State},
    Json,
};

use crate::app::AppState;
use crate::error::ApiResult;
use crate::model::{Page, PageVersion, VersionId};

/// GET /api/pages/:name/versions - prior versions, newest first
pub async fn get(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<Vec<PageVersion>>> {
    Ok(Json(state.provider.list_versions(&name).await?))
}

/// POST /api/pages/:name/versions/:version - make a prior version current
pub async fn post(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> ApiResult<Json<Page>> {
    let page = state.provider.restore_version(&name, &VersionId::new(version)).await?;
    Ok(Json(page))
}
