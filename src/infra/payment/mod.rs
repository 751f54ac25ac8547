//! Payment processor integration.
//!
//! The gateway trait is the seam between services and Stripe; the
//! concrete client talks to the Stripe REST API directly over reqwest
//! (no SDK dependency).

mod stripe;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppResult;

pub use stripe::{parse_webhook_event, verify_webhook_signature, StripeGateway};

/// A payment intent handle returned by the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    /// Caller-visible secret used to complete the charge client-side
    pub client_secret: String,
}

/// A verified, decoded webhook event from the processor.
///
/// `order_id` comes from the intent's own metadata (set at creation
/// time), never from any client-supplied identifier.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    pub kind: String,
    pub order_id: Option<Uuid>,
}

/// Payment gateway trait for dependency injection.
///
/// SOLID (DIP): services depend on this trait; tests substitute fakes.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for `amount_minor` (integer minor units),
    /// tagged with {order_id, user_id} reconciliation metadata.
    async fn create_intent(
        &self,
        amount_minor: i64,
        order_id: Uuid,
        user_id: Uuid,
        receipt_email: &str,
    ) -> AppResult<PaymentIntent>;

    /// Update an existing intent's amount in place
    async fn update_intent_amount(
        &self,
        intent_id: &str,
        amount_minor: i64,
    ) -> AppResult<PaymentIntent>;

    /// Mirror a catalog product into the processor; returns the processor
    /// product id.
    async fn create_product(
        &self,
        name: &str,
        description: Option<&str>,
        images: &[String],
        product_id: Uuid,
    ) -> AppResult<String>;

    /// Push name/description/images onto an already-mirrored product
    async fn update_product(
        &self,
        stripe_product_id: &str,
        name: &str,
        description: Option<&str>,
        images: &[String],
    ) -> AppResult<()>;

    /// Archive a mirrored product (processors disallow hard deletes of
    /// products that ever had prices)
    async fn archive_product(&self, stripe_product_id: &str) -> AppResult<()>;

    /// Create a price object for a mirrored product; returns the price id
    async fn create_price(&self, stripe_product_id: &str, amount_minor: i64)
        -> AppResult<String>;

    /// Archive a price object
    async fn archive_price(&self, stripe_price_id: &str) -> AppResult<()>;
}
