pub mod accounts;
pub mod auth;
pub mod cache;
pub mod catalog;
pub mod categories;
pub mod error;
pub mod health;
pub mod middleware;
pub mod products;
pub mod tokens;

use axum::{
    Router,
    http::{Method, header},
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use auth::{AppState, AppStateInner};

use crate::error::ApiError;
use crate::middleware::{require_admin, require_auth};

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route")
}

/// Public storefront routes, bearer-protected account routes and admin-only
/// catalog writes, merged into one router.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/api", get(health::api_info))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/products", get(products::list_products))
        .route("/api/products/featured", get(products::get_featured))
        .route("/api/products/slug/{slug}", get(products::get_product_by_slug))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/categories", get(categories::list_categories))
        .route("/api/categories/{slug}", get(categories::get_category));

    let account_routes = Router::new()
        .route("/api/auth/profile", get(auth::profile))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/products", post(products::create_product))
        .route(
            "/api/products/{id}",
            put(products::update_product).delete(products::delete_product),
        )
        .layer(from_fn_with_state(state.clone(), require_admin));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .merge(public_routes)
        .merge(account_routes)
        .merge(admin_routes)
        .fallback(route_not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
