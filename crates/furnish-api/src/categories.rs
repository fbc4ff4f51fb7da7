use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use furnish_types::api::{ApiResponse, CategoryListParams};

use crate::auth::AppState;
use crate::error::{ApiResult, blocking};

/// Active categories; top-level ones unless `?parent=` names a parent.
pub async fn list_categories(
    State(state): State<AppState>,
    params: Result<Query<CategoryListParams>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(params) = params?;
    let categories = blocking(move || state.catalog.list_categories(params.parent)).await?;
    Ok(Json(ApiResponse::ok(categories)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let category = blocking(move || state.catalog.get_category_by_slug(&slug)).await?;
    Ok(Json(ApiResponse::ok(category)))
}
