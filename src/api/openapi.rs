//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    auth_handler, order_handler, payment_handler, product_handler, user_handler,
};
use crate::domain::{
    CategorySummary, OrderItemResponse, OrderResponse, OrderStatus, PaymentStatus,
    ProductResponse, ProductSummary, ShippingAddress, UserResponse, UserRole, UserSummary,
};
use crate::services::{PaymentIntentResponse, StripeSyncResponse, TokenResponse, WebhookAck};
use crate::types::{MessageResponse, PaginationMeta};

/// OpenAPI documentation for the Craftmarket API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Craftmarket API",
        version = "0.1.0",
        description = "Storefront backend for handmade goods: catalog, orders, and Stripe payments",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(name = "API Support", email = "support@example.com")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        // Authentication endpoints
        auth_handler::register,
        auth_handler::login,
        // Profile endpoints
        user_handler::get_profile,
        user_handler::update_profile,
        // Catalog endpoints
        product_handler::list_products,
        product_handler::get_product,
        product_handler::create_product,
        product_handler::update_product,
        product_handler::delete_product,
        // Order endpoints
        order_handler::create_order,
        order_handler::my_orders,
        order_handler::get_order,
        order_handler::list_orders,
        // Payment endpoints
        payment_handler::create_payment_intent,
        payment_handler::webhook,
        payment_handler::mirror_product,
        payment_handler::push_product,
        payment_handler::unmirror_product,
    ),
    components(
        schemas(
            // Domain types
            UserRole,
            UserResponse,
            UserSummary,
            CategorySummary,
            ProductResponse,
            ProductSummary,
            OrderStatus,
            PaymentStatus,
            ShippingAddress,
            OrderItemResponse,
            OrderResponse,
            PaginationMeta,
            MessageResponse,
            // Auth types
            auth_handler::RegisterRequest,
            auth_handler::LoginRequest,
            TokenResponse,
            // Profile types
            user_handler::UpdateProfileRequest,
            // Catalog types
            product_handler::CreateProductRequest,
            product_handler::UpdateProductRequest,
            // Order types
            order_handler::OrderItemRequest,
            order_handler::ShippingAddressRequest,
            order_handler::CreateOrderRequest,
            // Payment types
            payment_handler::CreatePaymentIntentRequest,
            payment_handler::MirrorProductRequest,
            payment_handler::PushProductRequest,
            PaymentIntentResponse,
            WebhookAck,
            StripeSyncResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "User registration and login"),
        (name = "Users", description = "Profile operations"),
        (name = "Products", description = "Handmade goods catalog"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Payments", description = "Stripe payment bridge")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT token obtained from /auth/login"))
                        .build(),
                ),
            );
        }
    }
}
