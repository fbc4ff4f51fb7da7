use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

// -- Envelope --

/// Uniform body for every response, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

// -- JWT Claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by both access and refresh tokens; `typ` tells them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub email: String,
    pub role: Role,
}

// -- Products --

fn default_true() -> bool {
    true
}

fn default_low_stock_threshold() -> u32 {
    5
}

/// Body of `POST /api/products`. Counters and ratings are server-managed and
/// therefore not accepted here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category_id: Option<Uuid>,
    pub sku: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: u32,
    pub material: Option<String>,
    pub color: Option<String>,
    pub brand: Option<String>,
    pub warranty_period: Option<String>,
    pub care_instructions: Option<String>,
    #[serde(default)]
    pub has_360_view: bool,
    pub model_3d_url: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_customizable: bool,
    #[serde(default)]
    pub assembly_required: bool,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
}

impl NewProduct {
    /// Minimal product with every optional attribute left at its default.
    pub fn named(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            slug: None,
            description: None,
            short_description: None,
            category_id: None,
            sku: None,
            price,
            sale_price: None,
            cost_price: None,
            stock_quantity: 0,
            low_stock_threshold: default_low_stock_threshold(),
            material: None,
            color: None,
            brand: None,
            warranty_period: None,
            care_instructions: None,
            has_360_view: false,
            model_3d_url: None,
            is_featured: false,
            is_active: true,
            is_customizable: false,
            assembly_required: false,
            seo_title: None,
            seo_description: None,
        }
    }
}

/// Body of `PUT /api/products/{id}`: exactly the fields an update may touch.
/// Absent optional values overwrite the stored value with null; any other
/// field in the payload is rejected rather than ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductPatch {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_quantity: u32,
}

/// Query string of `GET /api/products`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListParams {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_sort_dir")]
    pub sort_dir: String,
    pub category: Option<Uuid>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

fn default_page_size() -> u32 {
    20
}

fn default_sort_by() -> String {
    "createdAt".to_string()
}

fn default_sort_dir() -> String {
    "desc".to_string()
}

// -- Categories --

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryListParams {
    pub parent: Option<Uuid>,
}

// -- Service info --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub application: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
