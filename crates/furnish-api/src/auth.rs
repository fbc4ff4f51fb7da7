use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use furnish_db::Database;
use furnish_types::api::{ApiResponse, Claims, LoginRequest, RefreshRequest, RegisterRequest};

use crate::accounts::{AccountService, Registration};
use crate::cache::PageCache;
use crate::catalog::CatalogService;
use crate::error::{ApiError, ApiResult, blocking};
use crate::tokens::TokenIssuer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub accounts: AccountService,
    pub catalog: CatalogService,
    pub tokens: Arc<TokenIssuer>,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, tokens: Arc<TokenIssuer>, cache: PageCache) -> AppState {
        Arc::new(Self {
            accounts: AccountService::new(db.clone(), tokens.clone()),
            catalog: CatalogService::new(db, cache),
            tokens,
        })
    }
}

fn validate_registration(req: &RegisterRequest) -> ApiResult<()> {
    let email = req.email.trim();
    let valid_email = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if !valid_email {
        return Err(ApiError::validation("A valid email address is required"));
    }
    let password_len = req.password.chars().count();
    if !(8..=128).contains(&password_len) {
        return Err(ApiError::validation("Password must be between 8 and 128 characters"));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::validation("First and last name are required"));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    validate_registration(&req)?;

    let registration = Registration {
        email: req.email,
        password: req.password,
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone,
    };
    let response = blocking(move || state.accounts.register(registration)).await?;

    Ok(Json(ApiResponse::ok_with_message("Registration successful", response)))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let response = blocking(move || state.accounts.login(&req.email, &req.password)).await?;

    Ok(Json(ApiResponse::ok_with_message("Login successful", response)))
}

/// Tokens are stateless; the client simply discards them.
pub async fn logout() -> impl IntoResponse {
    Json(ApiResponse::<()>::message("Logout successful"))
}

pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let response = blocking(move || state.accounts.refresh(&req.refresh_token)).await?;

    Ok(Json(ApiResponse::ok_with_message("Token refreshed", response)))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = blocking(move || state.accounts.profile(claims.sub)).await?;

    Ok(Json(ApiResponse::ok(user)))
}
