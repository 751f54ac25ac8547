//! Stripe integration via REST API (no SDK dependency).
//!
//! All calls are form-encoded POSTs authenticated with the secret key;
//! responses are inspected as JSON. Webhook signatures are HMAC-SHA256
//! over `"{timestamp}.{payload}"` per Stripe's v1 scheme.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::{PaymentGateway, PaymentIntent, WebhookEvent};
use crate::config::{PAYMENT_CURRENCY, STRIPE_API_BASE, WEBHOOK_TOLERANCE_SECONDS};
use crate::errors::{AppError, AppResult};

/// Stripe REST client
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
        }
    }

    /// POST a form to a Stripe endpoint, returning the parsed JSON body.
    ///
    /// Stripe reports failures as a 4xx/5xx with an `error` object; both
    /// are surfaced as `Upstream`.
    async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> AppResult<serde_json::Value> {
        let response = self
            .http
            .post(format!("{}{}", STRIPE_API_BASE, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("Stripe request failed: {}", e)))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("Stripe response unreadable: {}", e)))?;

        if !status.is_success() || body.get("error").is_some() {
            return Err(AppError::upstream(format!(
                "Stripe {} returned {}: {}",
                path, status, body
            )));
        }

        Ok(body)
    }

    fn require_str(body: &serde_json::Value, field: &str, path: &str) -> AppResult<String> {
        body[field]
            .as_str()
            .map(String::from)
            .ok_or_else(|| {
                AppError::upstream(format!("Stripe {} response missing '{}'", path, field))
            })
    }

    fn intent_from(body: &serde_json::Value, path: &str) -> AppResult<PaymentIntent> {
        Ok(PaymentIntent {
            id: Self::require_str(body, "id", path)?,
            client_secret: Self::require_str(body, "client_secret", path)?,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        order_id: Uuid,
        user_id: Uuid,
        receipt_email: &str,
    ) -> AppResult<PaymentIntent> {
        let form = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), PAYMENT_CURRENCY.to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("metadata[order_id]".to_string(), order_id.to_string()),
            ("metadata[user_id]".to_string(), user_id.to_string()),
            (
                "description".to_string(),
                format!("Order {} - craftmarket", order_id),
            ),
            ("receipt_email".to_string(), receipt_email.to_string()),
        ];

        let body = self.post_form("/payment_intents", &form).await?;
        Self::intent_from(&body, "/payment_intents")
    }

    async fn update_intent_amount(
        &self,
        intent_id: &str,
        amount_minor: i64,
    ) -> AppResult<PaymentIntent> {
        let path = format!("/payment_intents/{}", intent_id);
        let form = vec![("amount".to_string(), amount_minor.to_string())];
        let body = self.post_form(&path, &form).await?;
        Self::intent_from(&body, &path)
    }

    async fn create_product(
        &self,
        name: &str,
        description: Option<&str>,
        images: &[String],
        product_id: Uuid,
    ) -> AppResult<String> {
        let mut form = vec![
            ("name".to_string(), name.to_string()),
            ("metadata[product_id]".to_string(), product_id.to_string()),
        ];
        if let Some(description) = description {
            form.push(("description".to_string(), description.to_string()));
        }
        for (i, url) in images.iter().enumerate() {
            form.push((format!("images[{}]", i), url.clone()));
        }

        let body = self.post_form("/products", &form).await?;
        Self::require_str(&body, "id", "/products")
    }

    async fn update_product(
        &self,
        stripe_product_id: &str,
        name: &str,
        description: Option<&str>,
        images: &[String],
    ) -> AppResult<()> {
        let path = format!("/products/{}", stripe_product_id);
        let mut form = vec![("name".to_string(), name.to_string())];
        if let Some(description) = description {
            form.push(("description".to_string(), description.to_string()));
        }
        for (i, url) in images.iter().enumerate() {
            form.push((format!("images[{}]", i), url.clone()));
        }

        self.post_form(&path, &form).await?;
        Ok(())
    }

    async fn archive_product(&self, stripe_product_id: &str) -> AppResult<()> {
        let path = format!("/products/{}", stripe_product_id);
        self.post_form(&path, &[("active".to_string(), "false".to_string())])
            .await?;
        Ok(())
    }

    async fn create_price(
        &self,
        stripe_product_id: &str,
        amount_minor: i64,
    ) -> AppResult<String> {
        let form = vec![
            ("unit_amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), PAYMENT_CURRENCY.to_string()),
            ("product".to_string(), stripe_product_id.to_string()),
        ];

        let body = self.post_form("/prices", &form).await?;
        Self::require_str(&body, "id", "/prices")
    }

    async fn archive_price(&self, stripe_price_id: &str) -> AppResult<()> {
        let path = format!("/prices/{}", stripe_price_id);
        self.post_form(&path, &[("active".to_string(), "false".to_string())])
            .await?;
        Ok(())
    }
}

/// Verify a Stripe webhook signature (HMAC-SHA256).
///
/// The `Stripe-Signature` header carries `t=<timestamp>,v1=<hex hmac>`;
/// the signed payload is `"{timestamp}.{raw body}"`. Events older than
/// the tolerance window are rejected to prevent replay.
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> AppResult<()> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }

    if timestamp.is_empty() || signature.is_empty() {
        return Err(AppError::InvalidSignature);
    }

    let body = std::str::from_utf8(payload).map_err(|_| AppError::InvalidSignature)?;
    let signed_payload = format!("{}.{}", timestamp, body);

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::InvalidSignature)?;
    mac.update(signed_payload.as_bytes());

    // Constant-time comparison via verify_slice
    let sig_bytes = hex::decode(signature).map_err(|_| AppError::InvalidSignature)?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AppError::InvalidSignature)?;

    let ts: i64 = timestamp.parse().map_err(|_| AppError::InvalidSignature)?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECONDS {
        return Err(AppError::InvalidSignature);
    }

    Ok(())
}

/// Decode a verified webhook payload into a [`WebhookEvent`].
pub fn parse_webhook_event(payload: &[u8]) -> AppResult<WebhookEvent> {
    let event: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

    let id = event["id"].as_str().unwrap_or_default().to_string();
    let kind = event["type"].as_str().unwrap_or_default().to_string();
    let order_id = event["data"]["object"]["metadata"]["order_id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok());

    Ok(WebhookEvent { id, kind, order_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let signed = format!(
            "{}.{}",
            timestamp,
            std::str::from_utf8(payload).unwrap()
        );
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed.as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_a_freshly_signed_payload() {
        let payload = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
        let header = sign(payload, "whsec_test", chrono::Utc::now().timestamp());
        assert!(verify_webhook_signature(payload, &header, "whsec_test").is_ok());
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_other", chrono::Utc::now().timestamp());
        assert!(matches!(
            verify_webhook_signature(payload, &header, "whsec_test"),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_tampered_payload() {
        let payload = br#"{"id":"evt_1","amount":100}"#;
        let header = sign(payload, "whsec_test", chrono::Utc::now().timestamp());
        let tampered = br#"{"id":"evt_1","amount":999}"#;
        assert!(verify_webhook_signature(tampered, &header, "whsec_test").is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = br#"{"id":"evt_1"}"#;
        let stale = chrono::Utc::now().timestamp() - WEBHOOK_TOLERANCE_SECONDS - 10;
        let header = sign(payload, "whsec_test", stale);
        assert!(verify_webhook_signature(payload, &header, "whsec_test").is_err());
    }

    #[test]
    fn rejects_malformed_header() {
        let payload = br#"{}"#;
        assert!(verify_webhook_signature(payload, "v1=deadbeef", "s").is_err());
        assert!(verify_webhook_signature(payload, "t=123", "s").is_err());
        assert!(verify_webhook_signature(payload, "", "s").is_err());
    }

    #[test]
    fn parses_event_metadata() {
        let order_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "id": "evt_42",
            "type": "payment_intent.payment_failed",
            "data": { "object": { "metadata": { "order_id": order_id.to_string() } } }
        });
        let event = parse_webhook_event(payload.to_string().as_bytes()).unwrap();
        assert_eq!(event.id, "evt_42");
        assert_eq!(event.kind, "payment_intent.payment_failed");
        assert_eq!(event.order_id, Some(order_id));
    }

    #[test]
    fn event_without_metadata_has_no_order() {
        let event =
            parse_webhook_event(br#"{"id":"evt_1","type":"charge.refunded"}"#).unwrap();
        assert_eq!(event.order_id, None);
    }
}
