use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    response::IntoResponse,
};
use furnish_types::api::{ApiResponse, NewProduct, ProductListParams, ProductPatch};
use furnish_types::catalog::{MAX_PAGE_SIZE, PageRequest, Sort, SortDirection, SortField};
use uuid::Uuid;

use crate::auth::AppState;
use crate::catalog::resolve_filter;
use crate::error::{ApiError, ApiResult, blocking};

fn listing_options(params: &ProductListParams) -> ApiResult<(PageRequest, Sort)> {
    let field = SortField::parse(&params.sort_by)
        .ok_or_else(|| ApiError::validation(format!("Unsupported sort field '{}'", params.sort_by)))?;
    let page = PageRequest::new(params.page, params.size).ok_or_else(|| {
        ApiError::validation(format!("Page size must be between 1 and {MAX_PAGE_SIZE}"))
    })?;
    let sort = Sort {
        field,
        direction: SortDirection::parse(&params.sort_dir),
    };
    Ok((page, sort))
}

pub async fn list_products(
    State(state): State<AppState>,
    params: Result<Query<ProductListParams>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(params) = params?;
    let (page, sort) = listing_options(&params)?;
    let filter = resolve_filter(params.search, params.category, params.min_price, params.max_price);

    let listing = blocking(move || state.catalog.list(filter, page, sort)).await?;
    Ok(Json(ApiResponse::ok(listing)))
}

pub async fn get_product(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let product = blocking(move || state.catalog.get_by_id(id)).await?;
    Ok(Json(ApiResponse::ok(product)))
}

/// Storefront detail page; every hit counts as a view.
pub async fn get_product_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let product = blocking(move || state.catalog.get_by_slug(&slug)).await?;
    Ok(Json(ApiResponse::ok(product)))
}

pub async fn get_featured(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let products = blocking(move || state.catalog.get_featured()).await?;
    Ok(Json(ApiResponse::ok(products)))
}

pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = payload?;
    let product = blocking(move || state.catalog.create(input)).await?;
    Ok(Json(ApiResponse::ok_with_message("Product created successfully", product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    let product = blocking(move || state.catalog.update(id, patch)).await?;
    Ok(Json(ApiResponse::ok_with_message("Product updated successfully", product)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    blocking(move || state.catalog.delete(id)).await?;
    Ok(Json(ApiResponse::<()>::message("Product deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(sort_by: &str, sort_dir: &str, size: u32) -> ProductListParams {
        ProductListParams {
            page: 0,
            size,
            sort_by: sort_by.to_string(),
            sort_dir: sort_dir.to_string(),
            category: None,
            search: None,
            min_price: None,
            max_price: None,
        }
    }

    #[test]
    fn listing_options_parse_sort() {
        let (page, sort) = listing_options(&params("price", "ASC", 10)).unwrap();
        assert_eq!(page.size(), 10);
        assert_eq!(sort.field, SortField::Price);
        assert_eq!(sort.direction, SortDirection::Asc);

        let (_, sort) = listing_options(&params("createdAt", "sideways", 10)).unwrap();
        assert_eq!(sort.direction, SortDirection::Desc);
    }

    #[test]
    fn listing_options_reject_bad_input() {
        assert!(matches!(
            listing_options(&params("password", "asc", 10)),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            listing_options(&params("name", "asc", 0)),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            listing_options(&params("name", "asc", MAX_PAGE_SIZE + 1)),
            Err(ApiError::Validation(_))
        ));
    }
}
