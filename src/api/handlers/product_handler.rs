//! Product catalog handlers.
//!
//! Reads are public (with optional authentication so admins see the
//! full catalog); writes are admin-only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Extension, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{require_admin, CurrentUser};
use crate::api::AppState;
use crate::config::DEFAULT_PRODUCT_PAGE_SIZE;
use crate::domain::ProductResponse;
use crate::errors::AppResult;
use crate::infra::repositories::ProductSortBy;
use crate::services::{CatalogQuery, CreateProductInput, UpdateProductInput};
use crate::types::{MessageResponse, Paginated, PaginationParams, SortOrder};

/// Catalog listing query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductListQuery {
    /// 1-indexed page number
    pub page: Option<u64>,
    /// Page size (capped)
    pub limit: Option<u64>,
    /// Category slug filter
    pub category: Option<String>,
    /// Substring match against name and description
    pub search: Option<String>,
    /// Filter by active state (admin only; shoppers always see active)
    pub is_active: Option<bool>,
    #[param(value_type = Option<f64>)]
    pub min_price: Option<Decimal>,
    #[param(value_type = Option<f64>)]
    pub max_price: Option<Decimal>,
    /// One of: created_at, price, name
    #[param(value_type = Option<String>)]
    pub sort_by: Option<ProductSortBy>,
    /// One of: asc, desc
    #[param(value_type = Option<String>)]
    pub sort_order: Option<SortOrder>,
}

fn positive_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_positive() && !price.is_zero() {
        Ok(())
    } else {
        let mut err = ValidationError::new("price");
        err.message = Some("Price must be positive".into());
        Err(err)
    }
}

/// Product creation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    #[schema(example = "Rainbow Baby Blanket")]
    pub name: String,
    #[validate(length(max = 2000, message = "Description too long"))]
    pub description: Option<String>,
    #[validate(custom(function = "positive_price"))]
    #[schema(value_type = f64, example = 45.0)]
    pub price: Decimal,
    /// Units in stock
    #[validate(range(min = 0, message = "Inventory cannot be negative"))]
    #[schema(example = 10)]
    pub inventory: i32,
    pub category_id: Option<Uuid>,
    /// Image URLs
    #[serde(default)]
    pub images: Vec<String>,
    /// Free-form attributes (materials, dimensions, care)
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

/// Product update request; all fields optional
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000, message = "Description too long"))]
    pub description: Option<String>,
    #[validate(custom(function = "positive_price"))]
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    #[validate(range(min = 0, message = "Inventory cannot be negative"))]
    pub inventory: Option<i32>,
    pub is_active: Option<bool>,
    pub category_id: Option<Uuid>,
    pub images: Option<Vec<String>>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

/// Public catalog routes
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Admin catalog management routes
pub fn product_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(create_product))
        .route("/:id", axum::routing::put(update_product).delete(delete_product))
}

fn is_admin(user: &Option<Extension<CurrentUser>>) -> bool {
    user.as_ref().map(|u| u.is_admin()).unwrap_or(false)
}

/// List products with filtering and pagination
#[utoipa::path(
    get,
    path = "/products",
    tag = "Products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Page of products")
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Query(query): Query<ProductListQuery>,
) -> AppResult<Json<Paginated<ProductResponse>>> {
    let params = PaginationParams::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_PRODUCT_PAGE_SIZE),
    );
    let include_inactive = is_admin(&user);

    let page = state
        .product_service
        .list_products(
            CatalogQuery {
                category_slug: query.category,
                search: query.search,
                is_active: query.is_active,
                min_price: query.min_price,
                max_price: query.max_price,
                sort_by: query.sort_by,
                sort_order: query.sort_order,
            },
            params,
            include_inactive,
        )
        .await?;

    Ok(Json(page))
}

/// Get a single product
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "Products",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product details", body = ProductResponse),
        (status = 404, description = "Product not found")
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProductResponse>> {
    let product = state.product_service.get_product(id, is_admin(&user)).await?;
    Ok(Json(product))
}

/// Create a product (admin)
#[utoipa::path(
    post,
    path = "/products",
    tag = "Products",
    security(("bearer_auth" = [])),
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Product name already in use")
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ProductResponse>)> {
    require_admin(&current_user)?;

    let product = state
        .product_service
        .create_product(CreateProductInput {
            name: payload.name,
            description: payload.description,
            price: payload.price,
            inventory: payload.inventory,
            category_id: payload.category_id,
            images: payload.images,
            metadata: payload.metadata,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product (admin)
#[utoipa::path(
    put,
    path = "/products/{id}",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateProductRequest>,
) -> AppResult<Json<ProductResponse>> {
    require_admin(&current_user)?;

    let product = state
        .product_service
        .update_product(
            id,
            UpdateProductInput {
                name: payload.name,
                description: payload.description,
                price: payload.price,
                inventory: payload.inventory,
                is_active: payload.is_active,
                category_id: payload.category_id,
                images: payload.images,
                metadata: payload.metadata,
            },
        )
        .await?;

    Ok(Json(product))
}

/// Deactivate a product (admin)
#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deactivated", body = MessageResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&current_user)?;

    state.product_service.delete_product(id).await?;
    Ok(Json(MessageResponse::new("Product deactivated")))
}
