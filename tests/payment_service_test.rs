//! Payment bridge tests.
//!
//! Exercises the intent lifecycle and webhook reconciliation against
//! in-memory fakes that honor the repository contracts (conditional
//! begin_payment, idempotent settle_payment).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal_macros::dec;
use sha2::Sha256;
use uuid::Uuid;

use craftmarket::domain::{
    NewOrder, Order, OrderStatus, PaymentOutcome, PaymentStatus, Product, ShippingAddress,
};
use craftmarket::errors::{AppError, AppResult};
use craftmarket::infra::payment::{PaymentGateway, PaymentIntent};
use craftmarket::infra::repositories::{
    CategoryRepository, OrderFilter, OrderRepository, ProductFilter, ProductRepository,
    UserRepository,
};
use craftmarket::infra::UnitOfWork;
use craftmarket::services::{PaymentProcessor, PaymentService};
use craftmarket::types::PaginationParams;

const WEBHOOK_SECRET: &str = "whsec_test_secret";

// ---------------------------------------------------------------------------
// In-memory fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inventory {
    products: Mutex<HashMap<Uuid, Product>>,
}

#[derive(Default)]
struct OrderBook {
    orders: Mutex<HashMap<Uuid, Order>>,
    inventory: Arc<Inventory>,
}

fn shipping() -> ShippingAddress {
    ShippingAddress {
        name: "Jane Buyer".to_string(),
        address: "1 Main St".to_string(),
        city: "Portland".to_string(),
        state: "OR".to_string(),
        zip_code: "97201".to_string(),
        country: "US".to_string(),
    }
}

fn make_order(user_id: Uuid) -> Order {
    Order {
        id: Uuid::new_v4(),
        user_id,
        total: dec!(45.00),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_intent_id: None,
        shipping_address: shipping(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        items: Vec::new(),
    }
}

fn make_product(inventory: i32) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        name: "Rainbow Baby Blanket".to_string(),
        slug: "rainbow-baby-blanket".to_string(),
        description: None,
        price: dec!(45.00),
        inventory,
        is_active: true,
        category_id: None,
        images: Vec::new(),
        metadata: None,
        stripe_product_id: None,
        stripe_price_id: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl OrderRepository for OrderBook {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .get(&id)
            .filter(|o| o.user_id == user_id)
            .cloned())
    }

    async fn list_for_user(
        &self,
        _user_id: Uuid,
        _params: &PaginationParams,
    ) -> AppResult<(Vec<Order>, u64)> {
        unimplemented!("not used in payment tests")
    }

    async fn list(
        &self,
        _filter: &OrderFilter,
        _params: &PaginationParams,
    ) -> AppResult<(Vec<Order>, u64)> {
        unimplemented!("not used in payment tests")
    }

    async fn create_with_items(&self, _data: NewOrder) -> AppResult<Order> {
        unimplemented!("not used in payment tests")
    }

    async fn begin_payment(&self, order_id: Uuid, intent_id: &str) -> AppResult<bool> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(&order_id) {
            Some(order) if order.payment_status == PaymentStatus::Pending => {
                order.payment_status = PaymentStatus::Processing;
                order.payment_intent_id = Some(intent_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn settle_payment(&self, order_id: Uuid, outcome: PaymentOutcome) -> AppResult<bool> {
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.get_mut(&order_id) else {
            return Ok(false);
        };
        if order.payment_status.is_terminal() {
            return Ok(false);
        }

        if outcome.restores_inventory() {
            let mut products = self.inventory.products.lock().unwrap();
            for item in &order.items {
                if let Some(product) = products.get_mut(&item.product_id) {
                    product.inventory += item.quantity;
                }
            }
        }

        let (payment_status, status) = outcome.target_states();
        order.payment_status = payment_status;
        order.status = status;
        Ok(true)
    }
}

#[async_trait]
impl ProductRepository for Inventory {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.products.lock().unwrap().get(&id).cloned())
    }

    async fn slug_taken(&self, _slug: &str, _exclude: Option<Uuid>) -> AppResult<bool> {
        Ok(false)
    }

    async fn find_active_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        let products = self.products.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id))
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        filter: &ProductFilter,
        _params: &PaginationParams,
    ) -> AppResult<(Vec<Product>, u64)> {
        let products = self.products.lock().unwrap();
        let matching: Vec<Product> = products
            .values()
            .filter(|p| filter.is_active.map(|a| p.is_active == a).unwrap_or(true))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        Ok((matching, total))
    }

    async fn create(&self, _data: craftmarket::domain::NewProduct) -> AppResult<Product> {
        unimplemented!("not used in payment tests")
    }

    async fn update(
        &self,
        _id: Uuid,
        _patch: craftmarket::domain::ProductUpdate,
    ) -> AppResult<Product> {
        unimplemented!("not used in payment tests")
    }

    async fn deactivate(&self, _id: Uuid) -> AppResult<()> {
        unimplemented!("not used in payment tests")
    }

    async fn set_stripe_refs(
        &self,
        id: Uuid,
        stripe_product_id: Option<String>,
        stripe_price_id: Option<String>,
    ) -> AppResult<Product> {
        let mut products = self.products.lock().unwrap();
        let product = products.get_mut(&id).ok_or(AppError::NotFound)?;
        product.stripe_product_id = stripe_product_id;
        product.stripe_price_id = stripe_price_id;
        Ok(product.clone())
    }
}

struct FakeUow {
    orders: Arc<OrderBook>,
    inventory: Arc<Inventory>,
}

impl FakeUow {
    fn new() -> Self {
        let inventory = Arc::new(Inventory::default());
        let orders = Arc::new(OrderBook {
            orders: Mutex::new(HashMap::new()),
            inventory: inventory.clone(),
        });
        Self { orders, inventory }
    }
}

impl UnitOfWork for FakeUow {
    fn users(&self) -> Arc<dyn UserRepository> {
        unimplemented!("not used in payment tests")
    }
    fn categories(&self) -> Arc<dyn CategoryRepository> {
        unimplemented!("not used in payment tests")
    }
    fn products(&self) -> Arc<dyn ProductRepository> {
        self.inventory.clone()
    }
    fn orders(&self) -> Arc<dyn OrderRepository> {
        self.orders.clone()
    }
}

/// Gateway fake that counts calls and returns predictable ids
#[derive(Default)]
struct FakeGateway {
    intents_created: AtomicU32,
    intents_updated: AtomicU32,
    products_created: AtomicU32,
    products_archived: AtomicU32,
    prices_created: AtomicU32,
    prices_archived: Mutex<Vec<String>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(
        &self,
        _amount_minor: i64,
        order_id: Uuid,
        _user_id: Uuid,
        _receipt_email: &str,
    ) -> AppResult<PaymentIntent> {
        let n = self.intents_created.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentIntent {
            id: format!("pi_{}_{}", order_id.simple(), n),
            client_secret: format!("pi_secret_{}", n),
        })
    }

    async fn update_intent_amount(
        &self,
        intent_id: &str,
        _amount_minor: i64,
    ) -> AppResult<PaymentIntent> {
        self.intents_updated.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentIntent {
            id: intent_id.to_string(),
            client_secret: format!("{}_secret", intent_id),
        })
    }

    async fn create_product(
        &self,
        _name: &str,
        _description: Option<&str>,
        _images: &[String],
        product_id: Uuid,
    ) -> AppResult<String> {
        self.products_created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("prod_{}", product_id.simple()))
    }

    async fn update_product(
        &self,
        _stripe_product_id: &str,
        _name: &str,
        _description: Option<&str>,
        _images: &[String],
    ) -> AppResult<()> {
        Ok(())
    }

    async fn archive_product(&self, _stripe_product_id: &str) -> AppResult<()> {
        self.products_archived.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_price(&self, stripe_product_id: &str, amount_minor: i64) -> AppResult<String> {
        let n = self.prices_created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("price_{}_{}_{}", stripe_product_id, amount_minor, n))
    }

    async fn archive_price(&self, stripe_price_id: &str) -> AppResult<()> {
        self.prices_archived
            .lock()
            .unwrap()
            .push(stripe_price_id.to_string());
        Ok(())
    }
}

fn build_service(
    uow: Arc<FakeUow>,
    gateway: Arc<FakeGateway>,
) -> PaymentProcessor<FakeUow> {
    PaymentProcessor::new(uow, gateway, WEBHOOK_SECRET.to_string())
}

/// Produce a valid Stripe-Signature header for a payload
fn sign_payload(payload: &[u8]) -> String {
    let timestamp = Utc::now().timestamp();
    let signed = format!("{}.{}", timestamp, std::str::from_utf8(payload).unwrap());
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(signed.as_bytes());
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

fn event_payload(kind: &str, order_id: Uuid) -> Vec<u8> {
    serde_json::json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": kind,
        "data": { "object": {
            "id": "pi_123",
            "metadata": { "order_id": order_id.to_string() }
        }}
    })
    .to_string()
    .into_bytes()
}

// ---------------------------------------------------------------------------
// Intent lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_intent_request_creates_and_attaches() {
    let uow = Arc::new(FakeUow::new());
    let gateway = Arc::new(FakeGateway::default());
    let user_id = Uuid::new_v4();
    let order = make_order(user_id);
    let order_id = order.id;
    uow.orders.orders.lock().unwrap().insert(order_id, order);

    let svc = build_service(uow.clone(), gateway.clone());
    let response = svc
        .create_payment_intent(order_id, user_id, "jane@example.com")
        .await
        .unwrap();

    assert!(!response.client_secret.is_empty());
    assert_eq!(gateway.intents_created.load(Ordering::SeqCst), 1);

    let stored = uow.orders.orders.lock().unwrap()[&order_id].clone();
    assert_eq!(stored.payment_status, PaymentStatus::Processing);
    assert_eq!(stored.payment_intent_id.as_deref(), Some(response.payment_intent_id.as_str()));
}

#[tokio::test]
async fn repeat_intent_request_updates_in_place() {
    let uow = Arc::new(FakeUow::new());
    let gateway = Arc::new(FakeGateway::default());
    let user_id = Uuid::new_v4();
    let order = make_order(user_id);
    let order_id = order.id;
    uow.orders.orders.lock().unwrap().insert(order_id, order);

    let svc = build_service(uow.clone(), gateway.clone());
    let first = svc
        .create_payment_intent(order_id, user_id, "jane@example.com")
        .await
        .unwrap();
    let second = svc
        .create_payment_intent(order_id, user_id, "jane@example.com")
        .await
        .unwrap();

    assert_eq!(first.payment_intent_id, second.payment_intent_id);
    assert_eq!(gateway.intents_created.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.intents_updated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn settled_order_is_not_payable() {
    let uow = Arc::new(FakeUow::new());
    let gateway = Arc::new(FakeGateway::default());
    let user_id = Uuid::new_v4();
    let mut order = make_order(user_id);
    order.payment_status = PaymentStatus::Succeeded;
    order.status = OrderStatus::Confirmed;
    let order_id = order.id;
    uow.orders.orders.lock().unwrap().insert(order_id, order);

    let svc = build_service(uow, gateway.clone());
    let err = svc
        .create_payment_intent(order_id, user_id, "jane@example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::OrderNotPayable));
    assert_eq!(gateway.intents_created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn intent_for_someone_elses_order_is_not_found() {
    let uow = Arc::new(FakeUow::new());
    let order = make_order(Uuid::new_v4());
    let order_id = order.id;
    uow.orders.orders.lock().unwrap().insert(order_id, order);

    let svc = build_service(uow, Arc::new(FakeGateway::default()));
    let err = svc
        .create_payment_intent(order_id, Uuid::new_v4(), "eve@example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound));
}

// ---------------------------------------------------------------------------
// Webhook reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn successful_payment_confirms_the_order() {
    let uow = Arc::new(FakeUow::new());
    let user_id = Uuid::new_v4();
    let mut order = make_order(user_id);
    order.payment_status = PaymentStatus::Processing;
    let order_id = order.id;
    uow.orders.orders.lock().unwrap().insert(order_id, order);

    let svc = build_service(uow.clone(), Arc::new(FakeGateway::default()));
    let payload = event_payload("payment_intent.succeeded", order_id);
    let ack = svc
        .handle_webhook(&payload, &sign_payload(&payload))
        .await
        .unwrap();

    assert!(ack.received);
    let stored = uow.orders.orders.lock().unwrap()[&order_id].clone();
    assert_eq!(stored.payment_status, PaymentStatus::Succeeded);
    assert_eq!(stored.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn failed_payment_restores_inventory_exactly_once() {
    let uow = Arc::new(FakeUow::new());
    let user_id = Uuid::new_v4();

    let product = make_product(3);
    let product_id = product.id;
    uow.inventory
        .products
        .lock()
        .unwrap()
        .insert(product_id, product);

    let mut order = make_order(user_id);
    order.payment_status = PaymentStatus::Processing;
    order.items.push(craftmarket::domain::OrderItem {
        id: Uuid::new_v4(),
        product_id,
        quantity: 2,
        price: dec!(45.00),
        product: None,
    });
    let order_id = order.id;
    uow.orders.orders.lock().unwrap().insert(order_id, order);

    let svc = build_service(uow.clone(), Arc::new(FakeGateway::default()));
    let payload = event_payload("payment_intent.payment_failed", order_id);

    // First delivery restores the two reserved units
    svc.handle_webhook(&payload, &sign_payload(&payload))
        .await
        .unwrap();
    assert_eq!(
        uow.inventory.products.lock().unwrap()[&product_id].inventory,
        5
    );

    // Replays acknowledge but change nothing
    svc.handle_webhook(&payload, &sign_payload(&payload))
        .await
        .unwrap();
    assert_eq!(
        uow.inventory.products.lock().unwrap()[&product_id].inventory,
        5
    );

    let stored = uow.orders.orders.lock().unwrap()[&order_id].clone();
    assert_eq!(stored.payment_status, PaymentStatus::Failed);
    assert_eq!(stored.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn tampered_webhook_is_rejected() {
    let uow = Arc::new(FakeUow::new());
    let order = make_order(Uuid::new_v4());
    let order_id = order.id;
    uow.orders.orders.lock().unwrap().insert(order_id, order);

    let svc = build_service(uow.clone(), Arc::new(FakeGateway::default()));
    let payload = event_payload("payment_intent.succeeded", order_id);
    let header = sign_payload(&payload);
    let tampered = event_payload("payment_intent.succeeded", Uuid::new_v4());

    let err = svc.handle_webhook(&tampered, &header).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));

    // Order untouched
    let stored = uow.orders.orders.lock().unwrap()[&order_id].clone();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn unknown_event_kinds_are_acknowledged_without_effect() {
    let uow = Arc::new(FakeUow::new());
    let order = make_order(Uuid::new_v4());
    let order_id = order.id;
    uow.orders.orders.lock().unwrap().insert(order_id, order);

    let svc = build_service(uow.clone(), Arc::new(FakeGateway::default()));
    let payload = event_payload("charge.refunded", order_id);
    let ack = svc
        .handle_webhook(&payload, &sign_payload(&payload))
        .await
        .unwrap();

    assert!(ack.received);
    let stored = uow.orders.orders.lock().unwrap()[&order_id].clone();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
}

// ---------------------------------------------------------------------------
// Catalog mirroring
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mirroring_creates_product_and_price_and_stores_refs() {
    let uow = Arc::new(FakeUow::new());
    let gateway = Arc::new(FakeGateway::default());

    let product = make_product(4);
    let product_id = product.id;
    uow.inventory
        .products
        .lock()
        .unwrap()
        .insert(product_id, product);

    let svc = build_service(uow.clone(), gateway.clone());
    let refs = svc.mirror_product(product_id).await.unwrap();

    assert_eq!(gateway.products_created.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.prices_created.load(Ordering::SeqCst), 1);

    let stored = uow.inventory.products.lock().unwrap()[&product_id].clone();
    assert_eq!(stored.stripe_product_id.as_deref(), Some(refs.stripe_product_id.as_str()));
    assert_eq!(stored.stripe_price_id, refs.stripe_price_id);
}

#[tokio::test]
async fn mirroring_twice_is_a_bad_request() {
    let uow = Arc::new(FakeUow::new());
    let gateway = Arc::new(FakeGateway::default());

    let product = make_product(4);
    let product_id = product.id;
    uow.inventory
        .products
        .lock()
        .unwrap()
        .insert(product_id, product);

    let svc = build_service(uow.clone(), gateway.clone());
    svc.mirror_product(product_id).await.unwrap();
    let err = svc.mirror_product(product_id).await.unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(gateway.products_created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn price_change_rolls_to_a_new_price_and_archives_the_old() {
    let uow = Arc::new(FakeUow::new());
    let gateway = Arc::new(FakeGateway::default());

    let product = make_product(4);
    let product_id = product.id;
    uow.inventory
        .products
        .lock()
        .unwrap()
        .insert(product_id, product);

    let svc = build_service(uow.clone(), gateway.clone());
    let first = svc.mirror_product(product_id).await.unwrap();
    let old_price = first.stripe_price_id.clone().unwrap();

    // A metadata-only push keeps the price
    let pushed = svc.push_product(product_id, false).await.unwrap();
    assert_eq!(pushed.stripe_price_id.as_deref(), Some(old_price.as_str()));
    assert_eq!(gateway.prices_created.load(Ordering::SeqCst), 1);

    // A price change creates a new price and archives the old one
    let rolled = svc.push_product(product_id, true).await.unwrap();
    assert_ne!(rolled.stripe_price_id.as_deref(), Some(old_price.as_str()));
    assert_eq!(gateway.prices_created.load(Ordering::SeqCst), 2);
    assert_eq!(*gateway.prices_archived.lock().unwrap(), vec![old_price]);
}

#[tokio::test]
async fn pushing_an_unsynced_product_is_a_bad_request() {
    let uow = Arc::new(FakeUow::new());
    let product = make_product(4);
    let product_id = product.id;
    uow.inventory
        .products
        .lock()
        .unwrap()
        .insert(product_id, product);

    let svc = build_service(uow, Arc::new(FakeGateway::default()));
    let err = svc.push_product(product_id, true).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn unmirroring_archives_both_sides_and_clears_refs() {
    let uow = Arc::new(FakeUow::new());
    let gateway = Arc::new(FakeGateway::default());

    let product = make_product(4);
    let product_id = product.id;
    uow.inventory
        .products
        .lock()
        .unwrap()
        .insert(product_id, product);

    let svc = build_service(uow.clone(), gateway.clone());
    svc.mirror_product(product_id).await.unwrap();
    svc.unmirror_product(product_id).await.unwrap();

    assert_eq!(gateway.products_archived.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.prices_archived.lock().unwrap().len(), 1);

    let stored = uow.inventory.products.lock().unwrap()[&product_id].clone();
    assert!(stored.stripe_product_id.is_none());
    assert!(stored.stripe_price_id.is_none());
}
