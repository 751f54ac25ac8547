//! Order handlers.
//!
//! All order routes require authentication; the cross-user listing is
//! additionally admin-only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{require_admin, CurrentUser};
use crate::api::AppState;
use crate::domain::{OrderResponse, OrderStatus, PaymentStatus, ShippingAddress};
use crate::errors::AppResult;
use crate::infra::repositories::{OrderFilter, OrderSortBy};
use crate::services::CheckoutItem;
use crate::types::{Paginated, PaginationParams, SortOrder};

/// One line of a checkout request
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    /// Units requested
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    #[schema(example = 2)]
    pub quantity: i32,
}

/// Shipping address submitted at checkout
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ShippingAddressRequest {
    #[validate(length(min = 1, message = "Recipient name is required"))]
    #[schema(example = "Jane Buyer")]
    pub name: String,
    #[validate(length(min = 1, message = "Street address is required"))]
    #[schema(example = "1 Main St")]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
}

impl From<ShippingAddressRequest> for ShippingAddress {
    fn from(req: ShippingAddressRequest) -> Self {
        Self {
            name: req.name,
            address: req.address,
            city: req.city,
            state: req.state,
            zip_code: req.zip_code,
            country: req.country,
        }
    }
}

/// Checkout request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    #[validate(nested)]
    pub items: Vec<OrderItemRequest>,
    #[validate(nested)]
    pub shipping_address: ShippingAddressRequest,
}

/// Admin order listing query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Fulfillment status filter (e.g. PENDING, CONFIRMED)
    #[param(value_type = Option<String>)]
    pub status: Option<OrderStatus>,
    /// Payment status filter (e.g. PENDING, SUCCEEDED)
    #[param(value_type = Option<String>)]
    pub payment_status: Option<PaymentStatus>,
    /// One of: created_at, total, status
    #[param(value_type = Option<String>)]
    pub sort_by: Option<OrderSortBy>,
    /// One of: asc, desc
    #[param(value_type = Option<String>)]
    pub sort_order: Option<SortOrder>,
}

/// Create order routes (all behind authentication)
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/my-orders", get(my_orders))
        .route("/:id", get(get_order))
}

/// Place an order
#[utoipa::path(
    post,
    path = "/orders",
    tag = "Orders",
    security(("bearer_auth" = [])),
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Validation error, unavailable product, or insufficient inventory"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<OrderResponse>)> {
    let items = payload
        .items
        .into_iter()
        .map(|item| CheckoutItem {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();

    let order = state
        .order_service
        .create_order(current_user.id, items, payload.shipping_address.into())
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// List the caller's own orders
#[utoipa::path(
    get,
    path = "/orders/my-orders",
    tag = "Orders",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of the caller's orders"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn my_orders(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Paginated<OrderResponse>>> {
    let page = state.order_service.my_orders(current_user.id, params).await?;
    Ok(Json(page))
}

/// Get a single order (owner or admin)
#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "Orders",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order details", body = OrderResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderResponse>> {
    let order = state
        .order_service
        .get_order(id, current_user.id, current_user.is_admin())
        .await?;
    Ok(Json(order))
}

/// List all orders (admin)
#[utoipa::path(
    get,
    path = "/orders",
    tag = "Orders",
    security(("bearer_auth" = [])),
    params(OrderListQuery),
    responses(
        (status = 200, description = "Page of all orders with buyer summaries"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<Paginated<OrderResponse>>> {
    require_admin(&current_user)?;

    let params = PaginationParams::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(crate::config::DEFAULT_PAGE_SIZE),
    );
    let filter = OrderFilter {
        status: query.status,
        payment_status: query.payment_status,
        sort_by: query.sort_by.unwrap_or(OrderSortBy::CreatedAt),
        sort_order: query.sort_order.unwrap_or_default(),
    };

    let page = state.order_service.list_all(filter, params).await?;
    Ok(Json(page))
}
