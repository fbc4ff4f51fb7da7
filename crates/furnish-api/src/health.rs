use axum::{Json, response::IntoResponse};
use chrono::Utc;
use furnish_types::api::{ApiResponse, HealthResponse};
use serde_json::json;

const APPLICATION: &str = "Furnish";

pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "UP".to_string(),
        application: APPLICATION.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    }))
}

pub async fn api_info() -> impl IntoResponse {
    Json(ApiResponse::ok(json!({
        "name": APPLICATION,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "auth": "/api/auth",
            "products": "/api/products",
            "categories": "/api/categories",
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, http::StatusCode, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_up() {
        let app = Router::new().route("/health", get(health));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "UP");
        assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    }
}
