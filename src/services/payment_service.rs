//! Payment service - Bridges orders to the payment processor.
//!
//! SOLID (SRP): Intent lifecycle, webhook reconciliation, and catalog
//! mirroring only.
//! SOLID (DIP): Talks to the processor through the PaymentGateway trait.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{PaymentOutcome, PaymentStatus};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::payment::{parse_webhook_event, verify_webhook_signature};
use crate::infra::{PaymentGateway, UnitOfWork};

/// Response to a payment-intent request
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentIntentResponse {
    /// Client-side secret used to complete the charge
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// Webhook acknowledgement body
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

/// Processor-side references for a mirrored catalog product
#[derive(Debug, Serialize, ToSchema)]
pub struct StripeSyncResponse {
    pub product_id: Uuid,
    #[schema(example = "prod_NWjs8kKbJWmuuc")]
    pub stripe_product_id: String,
    #[schema(example = "price_1MoBy5LkdIwHu7ixZhnattbh")]
    pub stripe_price_id: Option<String>,
}

/// Payment service trait for dependency injection.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Create (or refresh) the payment intent for one of the caller's
    /// orders and return its client secret.
    async fn create_payment_intent(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        receipt_email: &str,
    ) -> AppResult<PaymentIntentResponse>;

    /// Verify and apply a processor webhook. Unknown event kinds and
    /// replayed deliveries are acknowledged without effect.
    async fn handle_webhook(&self, payload: &[u8], signature_header: &str)
        -> AppResult<WebhookAck>;

    /// Mirror a catalog product into the processor (product + price),
    /// persisting the returned references.
    async fn mirror_product(&self, product_id: Uuid) -> AppResult<StripeSyncResponse>;

    /// Push name/description/images onto an already-mirrored product;
    /// when the price changed, roll to a new price and archive the old.
    async fn push_product(
        &self,
        product_id: Uuid,
        price_changed: bool,
    ) -> AppResult<StripeSyncResponse>;

    /// Archive a mirrored product and its price, clearing the stored refs
    async fn unmirror_product(&self, product_id: Uuid) -> AppResult<()>;
}

/// Concrete implementation of PaymentService using Unit of Work.
pub struct PaymentProcessor<U: UnitOfWork> {
    uow: Arc<U>,
    gateway: Arc<dyn PaymentGateway>,
    webhook_secret: String,
}

impl<U: UnitOfWork> PaymentProcessor<U> {
    pub fn new(uow: Arc<U>, gateway: Arc<dyn PaymentGateway>, webhook_secret: String) -> Self {
        Self {
            uow,
            gateway,
            webhook_secret,
        }
    }
}

/// Convert a decimal amount to integer minor units (cents)
fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| AppError::internal(format!("Amount out of range: {}", amount)))
}

#[async_trait]
impl<U: UnitOfWork> PaymentService for PaymentProcessor<U> {
    async fn create_payment_intent(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        receipt_email: &str,
    ) -> AppResult<PaymentIntentResponse> {
        let order = self
            .uow
            .orders()
            .find_for_user(order_id, user_id)
            .await?
            .ok_or_not_found()?;

        if order.payment_status.is_terminal() {
            return Err(AppError::OrderNotPayable);
        }

        let amount = to_minor_units(order.total)?;

        // An order already mid-payment keeps its intent; the amount is
        // refreshed in place so the client secret stays valid
        if let Some(ref intent_id) = order.payment_intent_id {
            let intent = self.gateway.update_intent_amount(intent_id, amount).await?;
            return Ok(PaymentIntentResponse {
                client_secret: intent.client_secret,
                payment_intent_id: intent.id,
            });
        }

        if order.payment_status != PaymentStatus::Pending {
            return Err(AppError::OrderNotPayable);
        }

        let intent = self
            .gateway
            .create_intent(amount, order.id, user_id, receipt_email)
            .await?;

        // Conditional on the order still being PENDING; losing this race
        // means a concurrent request already attached an intent
        if !self.uow.orders().begin_payment(order.id, &intent.id).await? {
            return Err(AppError::OrderNotPayable);
        }

        Ok(PaymentIntentResponse {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
        })
    }

    async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> AppResult<WebhookAck> {
        verify_webhook_signature(payload, signature_header, &self.webhook_secret)?;
        let event = parse_webhook_event(payload)?;

        let outcome = match event.kind.as_str() {
            "payment_intent.succeeded" => PaymentOutcome::Succeeded,
            "payment_intent.payment_failed" => PaymentOutcome::Failed,
            "payment_intent.canceled" => PaymentOutcome::Cancelled,
            other => {
                tracing::debug!(event = %event.id, kind = %other, "Ignoring webhook event");
                return Ok(WebhookAck { received: true });
            }
        };

        // The order reference comes from the intent's own metadata; an
        // intent we did not create carries none and is acknowledged as-is
        let Some(order_id) = event.order_id else {
            tracing::warn!(event = %event.id, "Payment event without order metadata");
            return Ok(WebhookAck { received: true });
        };

        let applied = self.uow.orders().settle_payment(order_id, outcome).await?;
        if applied {
            tracing::info!(%order_id, ?outcome, "Payment settled");
        } else {
            tracing::info!(%order_id, event = %event.id, "Duplicate or stale payment event ignored");
        }

        Ok(WebhookAck { received: true })
    }

    async fn mirror_product(&self, product_id: Uuid) -> AppResult<StripeSyncResponse> {
        let product = self
            .uow
            .products()
            .find_by_id(product_id)
            .await?
            .ok_or_not_found()?;

        if product.stripe_product_id.is_some() {
            return Err(AppError::BadRequest(
                "Product already synced with Stripe".to_string(),
            ));
        }

        let stripe_product_id = self
            .gateway
            .create_product(
                &product.name,
                product.description.as_deref(),
                &product.images,
                product.id,
            )
            .await?;
        let amount = to_minor_units(product.price)?;
        let stripe_price_id = self.gateway.create_price(&stripe_product_id, amount).await?;

        self.uow
            .products()
            .set_stripe_refs(
                product.id,
                Some(stripe_product_id.clone()),
                Some(stripe_price_id.clone()),
            )
            .await?;

        tracing::info!(%product_id, %stripe_product_id, "Product mirrored to Stripe");

        Ok(StripeSyncResponse {
            product_id: product.id,
            stripe_product_id,
            stripe_price_id: Some(stripe_price_id),
        })
    }

    async fn push_product(
        &self,
        product_id: Uuid,
        price_changed: bool,
    ) -> AppResult<StripeSyncResponse> {
        let product = self
            .uow
            .products()
            .find_by_id(product_id)
            .await?
            .ok_or_not_found()?;

        let Some(stripe_product_id) = product.stripe_product_id.clone() else {
            return Err(AppError::BadRequest(
                "Product not synced with Stripe".to_string(),
            ));
        };

        self.gateway
            .update_product(
                &stripe_product_id,
                &product.name,
                product.description.as_deref(),
                &product.images,
            )
            .await?;

        // Stripe prices are immutable: a changed amount means a new price
        // object, with the previous one archived
        let mut stripe_price_id = product.stripe_price_id.clone();
        if price_changed {
            let amount = to_minor_units(product.price)?;
            let new_price = self.gateway.create_price(&stripe_product_id, amount).await?;
            if let Some(ref old_price) = product.stripe_price_id {
                self.gateway.archive_price(old_price).await?;
            }
            self.uow
                .products()
                .set_stripe_refs(
                    product.id,
                    Some(stripe_product_id.clone()),
                    Some(new_price.clone()),
                )
                .await?;
            stripe_price_id = Some(new_price);
        }

        Ok(StripeSyncResponse {
            product_id: product.id,
            stripe_product_id,
            stripe_price_id,
        })
    }

    async fn unmirror_product(&self, product_id: Uuid) -> AppResult<()> {
        let product = self
            .uow
            .products()
            .find_by_id(product_id)
            .await?
            .ok_or_not_found()?;

        let Some(ref stripe_product_id) = product.stripe_product_id else {
            return Err(AppError::BadRequest(
                "Product not synced with Stripe".to_string(),
            ));
        };

        // Processors disallow deleting products that ever held prices, so
        // both sides are archived instead
        self.gateway.archive_product(stripe_product_id).await?;
        if let Some(ref price_id) = product.stripe_price_id {
            self.gateway.archive_price(price_id).await?;
        }

        self.uow
            .products()
            .set_stripe_refs(product.id, None, None)
            .await?;

        tracing::info!(%product_id, "Stripe mirror archived");

        Ok(())
    }
}
