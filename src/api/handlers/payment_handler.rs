//! Payment bridge handlers.
//!
//! The webhook route reads the raw body because signature verification
//! covers the exact bytes Stripe sent; any re-serialization would break
//! the HMAC.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::post,
    Extension, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::{require_admin, CurrentUser};
use crate::api::AppState;
use crate::errors::{AppError, AppResult};
use crate::services::{PaymentIntentResponse, StripeSyncResponse, WebhookAck};
use crate::types::MessageResponse;

/// Payment intent request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePaymentIntentRequest {
    /// Id of the caller's order to pay for
    pub order_id: Uuid,
}

/// Stripe product sync request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MirrorProductRequest {
    /// Id of the catalog product to mirror
    pub product_id: Uuid,
}

/// Stripe product update request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct PushProductRequest {
    /// Set when the catalog price changed, to roll the Stripe price
    #[serde(default)]
    pub price_changed: bool,
}

/// Authenticated payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/create-payment-intent", post(create_payment_intent))
}

/// Admin payment routes
pub fn payment_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(mirror_product))
        .route(
            "/products/:id",
            axum::routing::put(push_product).delete(unmirror_product),
        )
}

/// Public webhook route (verified by signature, not by session)
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook", post(webhook))
}

/// Create or refresh a payment intent for an order
#[utoipa::path(
    post,
    path = "/stripe/create-payment-intent",
    tag = "Payments",
    security(("bearer_auth" = [])),
    request_body = CreatePaymentIntentRequest,
    responses(
        (status = 200, description = "Client secret for completing payment", body = PaymentIntentResponse),
        (status = 400, description = "Order is not payable"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<CreatePaymentIntentRequest>,
) -> AppResult<Json<PaymentIntentResponse>> {
    let intent = state
        .payment_service
        .create_payment_intent(payload.order_id, current_user.id, &current_user.email)
        .await?;

    Ok(Json(intent))
}

/// Stripe webhook receiver
#[utoipa::path(
    post,
    path = "/stripe/webhook",
    tag = "Payments",
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Invalid signature or payload")
    )
)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    let ack = state.payment_service.handle_webhook(&body, signature).await?;
    Ok(Json(ack))
}

/// Mirror a catalog product into Stripe (admin)
#[utoipa::path(
    post,
    path = "/stripe/products",
    tag = "Payments",
    security(("bearer_auth" = [])),
    request_body = MirrorProductRequest,
    responses(
        (status = 200, description = "Processor-side references", body = StripeSyncResponse),
        (status = 400, description = "Product already synced"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn mirror_product(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<MirrorProductRequest>,
) -> AppResult<Json<StripeSyncResponse>> {
    require_admin(&current_user)?;

    let refs = state.payment_service.mirror_product(payload.product_id).await?;
    Ok(Json(refs))
}

/// Push catalog changes onto a mirrored Stripe product (admin)
#[utoipa::path(
    put,
    path = "/stripe/products/{id}",
    tag = "Payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Catalog product id")),
    request_body = PushProductRequest,
    responses(
        (status = 200, description = "Processor-side references", body = StripeSyncResponse),
        (status = 400, description = "Product not synced"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn push_product(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<PushProductRequest>,
) -> AppResult<Json<StripeSyncResponse>> {
    require_admin(&current_user)?;

    let refs = state
        .payment_service
        .push_product(id, payload.price_changed)
        .await?;
    Ok(Json(refs))
}

/// Archive a mirrored Stripe product and clear its references (admin)
#[utoipa::path(
    delete,
    path = "/stripe/products/{id}",
    tag = "Payments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Catalog product id")),
    responses(
        (status = 200, description = "Mirror archived", body = MessageResponse),
        (status = 400, description = "Product not synced"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found")
    )
)]
pub async fn unmirror_product(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    require_admin(&current_user)?;

    state.payment_service.unmirror_product(id).await?;
    Ok(Json(MessageResponse::new("Stripe product archived")))
}
