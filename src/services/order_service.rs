//! Order service - Handles checkout and order retrieval.
//!
//! SOLID (SRP): Order placement and history only.
//! DDD: Orchestrates domain operations via Unit of Work; the atomic
//! write path (insert plus inventory decrements) lives in the order
//! repository.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{NewOrder, NewOrderItem, OrderResponse, ShippingAddress, UserSummary};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::repositories::OrderFilter;
use crate::infra::UnitOfWork;
use crate::types::{Paginated, PaginationParams};

/// One requested line of a checkout
#[derive(Debug, Clone)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Order service trait for dependency injection.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Place an order: validate the cart against live products, snapshot
    /// unit prices, and atomically persist the order while decrementing
    /// inventory.
    async fn create_order(
        &self,
        user_id: Uuid,
        items: Vec<CheckoutItem>,
        shipping_address: ShippingAddress,
    ) -> AppResult<OrderResponse>;

    /// Page of the caller's own orders, newest first
    async fn my_orders(
        &self,
        user_id: Uuid,
        params: PaginationParams,
    ) -> AppResult<Paginated<OrderResponse>>;

    /// Fetch one order. Admins see any order; other callers only see
    /// their own, and someone else's order is `NotFound`, not
    /// `Forbidden`, to avoid leaking its existence.
    async fn get_order(&self, id: Uuid, user_id: Uuid, is_admin: bool) -> AppResult<OrderResponse>;

    /// Admin listing across all users, with buyer summaries attached
    async fn list_all(
        &self,
        filter: OrderFilter,
        params: PaginationParams,
    ) -> AppResult<Paginated<OrderResponse>>;
}

/// Concrete implementation of OrderService using Unit of Work.
pub struct OrderManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> OrderManager<U> {
    /// Create new order service instance with Unit of Work
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<U: UnitOfWork> OrderService for OrderManager<U> {
    async fn create_order(
        &self,
        user_id: Uuid,
        items: Vec<CheckoutItem>,
        shipping_address: ShippingAddress,
    ) -> AppResult<OrderResponse> {
        if items.is_empty() {
            return Err(AppError::validation("Order must contain at least one item"));
        }
        if items.iter().any(|item| item.quantity <= 0) {
            return Err(AppError::validation("Item quantity must be positive"));
        }

        let product_ids: Vec<Uuid> = {
            let mut ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };
        if product_ids.len() != items.len() {
            return Err(AppError::validation("Duplicate products in order"));
        }

        // Every requested product must exist and be active
        let products = self.uow.products().find_active_by_ids(&product_ids).await?;
        if products.len() != product_ids.len() {
            return Err(AppError::ProductUnavailable);
        }
        let by_id: HashMap<Uuid, _> = products.into_iter().map(|p| (p.id, p)).collect();

        // Pre-check inventory so the common failure reports the product by
        // name; the transactional decrement still guards against races
        let mut lines = Vec::with_capacity(items.len());
        let mut total = Decimal::ZERO;
        for item in &items {
            let product = by_id
                .get(&item.product_id)
                .ok_or(AppError::ProductUnavailable)?;
            if product.inventory < item.quantity {
                return Err(AppError::InsufficientInventory {
                    name: product.name.clone(),
                    available: product.inventory,
                    requested: item.quantity,
                });
            }
            total += product.price * Decimal::from(item.quantity);
            lines.push(NewOrderItem {
                product_id: product.id,
                quantity: item.quantity,
                price: product.price,
            });
        }

        let order = self
            .uow
            .orders()
            .create_with_items(NewOrder {
                user_id,
                total,
                shipping_address,
                items: lines,
            })
            .await?;

        Ok(OrderResponse::from(order))
    }

    async fn my_orders(
        &self,
        user_id: Uuid,
        params: PaginationParams,
    ) -> AppResult<Paginated<OrderResponse>> {
        let (orders, total) = self.uow.orders().list_for_user(user_id, &params).await?;
        let responses = orders.into_iter().map(OrderResponse::from).collect();
        Ok(Paginated::new(responses, params.page, params.limit(), total))
    }

    async fn get_order(&self, id: Uuid, user_id: Uuid, is_admin: bool) -> AppResult<OrderResponse> {
        let orders = self.uow.orders();
        let order = if is_admin {
            orders.find_by_id(id).await?
        } else {
            orders.find_for_user(id, user_id).await?
        };
        Ok(OrderResponse::from(order.ok_or_not_found()?))
    }

    async fn list_all(
        &self,
        filter: OrderFilter,
        params: PaginationParams,
    ) -> AppResult<Paginated<OrderResponse>> {
        let (orders, total) = self.uow.orders().list(&filter, &params).await?;

        // Batch-load buyer summaries for the page
        let user_ids: Vec<Uuid> = {
            let mut ids: Vec<Uuid> = orders.iter().map(|o| o.user_id).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };
        let users: HashMap<Uuid, UserSummary> = self
            .uow
            .users()
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| {
                (
                    u.id,
                    UserSummary {
                        id: u.id,
                        name: u.name,
                        email: u.email,
                    },
                )
            })
            .collect();

        let responses = orders
            .into_iter()
            .map(|order| {
                let user = users.get(&order.user_id).cloned();
                OrderResponse::from_order(order, user)
            })
            .collect();

        Ok(Paginated::new(responses, params.page, params.limit(), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Order, Product};
    use crate::infra::repositories::{
        CategoryRepository, OrderRepository, ProductRepository, UserRepository,
    };
    use chrono::Utc;
    use mockall::mock;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    mock! {
        pub Products {}

        #[async_trait]
        impl ProductRepository for Products {
            async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>>;
            async fn slug_taken(&self, slug: &str, exclude: Option<Uuid>) -> AppResult<bool>;
            async fn find_active_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Product>>;
            async fn list(
                &self,
                filter: &crate::infra::repositories::ProductFilter,
                params: &PaginationParams,
            ) -> AppResult<(Vec<Product>, u64)>;
            async fn create(&self, data: crate::domain::NewProduct) -> AppResult<Product>;
            async fn update(
                &self,
                id: Uuid,
                patch: crate::domain::ProductUpdate,
            ) -> AppResult<Product>;
            async fn deactivate(&self, id: Uuid) -> AppResult<()>;
            async fn set_stripe_refs(
                &self,
                id: Uuid,
                stripe_product_id: Option<String>,
                stripe_price_id: Option<String>,
            ) -> AppResult<Product>;
        }
    }

    mock! {
        pub Orders {}

        #[async_trait]
        impl OrderRepository for Orders {
            async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>>;
            async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Order>>;
            async fn list_for_user(
                &self,
                user_id: Uuid,
                params: &PaginationParams,
            ) -> AppResult<(Vec<Order>, u64)>;
            async fn list(
                &self,
                filter: &OrderFilter,
                params: &PaginationParams,
            ) -> AppResult<(Vec<Order>, u64)>;
            async fn create_with_items(&self, data: NewOrder) -> AppResult<Order>;
            async fn begin_payment(&self, order_id: Uuid, intent_id: &str) -> AppResult<bool>;
            async fn settle_payment(
                &self,
                order_id: Uuid,
                outcome: crate::domain::PaymentOutcome,
            ) -> AppResult<bool>;
        }
    }

    struct FakeUow {
        products: Arc<MockProducts>,
        orders: Arc<MockOrders>,
    }

    impl UnitOfWork for FakeUow {
        fn users(&self) -> Arc<dyn UserRepository> {
            unimplemented!("not used in these tests")
        }
        fn categories(&self) -> Arc<dyn CategoryRepository> {
            unimplemented!("not used in these tests")
        }
        fn products(&self) -> Arc<dyn ProductRepository> {
            self.products.clone()
        }
        fn orders(&self) -> Arc<dyn OrderRepository> {
            self.orders.clone()
        }
    }

    fn product(id: Uuid, name: &str, price: Decimal, inventory: i32) -> Product {
        let now = Utc::now();
        Product {
            id,
            name: name.to_string(),
            slug: crate::domain::slugify(name),
            description: None,
            price,
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

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Jane Buyer".to_string(),
            address: "1 Main St".to_string(),
            city: "Portland".to_string(),
            state: "OR".to_string(),
            zip_code: "97201".to_string(),
            country: "US".to_string(),
        }
    }

    fn service(products: MockProducts, orders: MockOrders) -> OrderManager<FakeUow> {
        OrderManager::new(Arc::new(FakeUow {
            products: Arc::new(products),
            orders: Arc::new(orders),
        }))
    }

    #[tokio::test]
    async fn checkout_totals_price_times_quantity_across_lines() {
        let blanket = Uuid::new_v4();
        let mug = Uuid::new_v4();

        let mut products = MockProducts::new();
        products.expect_find_active_by_ids().returning(move |_| {
            Ok(vec![
                product(blanket, "Rainbow Baby Blanket", dec!(45.00), 10),
                product(mug, "Stoneware Mug", dec!(18.50), 5),
            ])
        });

        let mut orders = MockOrders::new();
        orders
            .expect_create_with_items()
            .withf(|data: &NewOrder| data.total == dec!(127.00) && data.items.len() == 2)
            .returning(|data| {
                Ok(Order {
                    id: Uuid::new_v4(),
                    user_id: data.user_id,
                    total: data.total,
                    status: crate::domain::OrderStatus::Pending,
                    payment_status: crate::domain::PaymentStatus::Pending,
                    payment_intent_id: None,
                    shipping_address: data.shipping_address,
                    items: Vec::new(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
            });

        let svc = service(products, orders);
        let response = svc
            .create_order(
                Uuid::new_v4(),
                vec![
                    CheckoutItem {
                        product_id: blanket,
                        quantity: 2,
                    },
                    CheckoutItem {
                        product_id: mug,
                        quantity: 2,
                    },
                ],
                address(),
            )
            .await
            .unwrap();

        // 2 * 45.00 + 2 * 18.50
        assert_eq!(response.total, dec!(127.00));
    }

    #[tokio::test]
    async fn missing_product_fails_before_any_write() {
        let known = Uuid::new_v4();
        let unknown = Uuid::new_v4();

        let mut products = MockProducts::new();
        products
            .expect_find_active_by_ids()
            .returning(move |_| Ok(vec![product(known, "Candle", dec!(12.00), 3)]));

        let mut orders = MockOrders::new();
        orders.expect_create_with_items().times(0);

        let svc = service(products, orders);
        let err = svc
            .create_order(
                Uuid::new_v4(),
                vec![
                    CheckoutItem {
                        product_id: known,
                        quantity: 1,
                    },
                    CheckoutItem {
                        product_id: unknown,
                        quantity: 1,
                    },
                ],
                address(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ProductUnavailable));
    }

    #[tokio::test]
    async fn insufficient_inventory_names_the_product() {
        let id = Uuid::new_v4();

        let mut products = MockProducts::new();
        products
            .expect_find_active_by_ids()
            .returning(move |_| Ok(vec![product(id, "Wool Scarf", dec!(30.00), 2)]));

        let mut orders = MockOrders::new();
        orders.expect_create_with_items().times(0);

        let svc = service(products, orders);
        let err = svc
            .create_order(
                Uuid::new_v4(),
                vec![CheckoutItem {
                    product_id: id,
                    quantity: 5,
                }],
                address(),
            )
            .await
            .unwrap_err();

        match err {
            AppError::InsufficientInventory {
                name,
                available,
                requested,
            } => {
                assert_eq!(name, "Wool Scarf");
                assert_eq!(available, 2);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_empty_and_duplicate_carts() {
        let id = Uuid::new_v4();

        let svc = service(MockProducts::new(), MockOrders::new());
        assert!(matches!(
            svc.create_order(Uuid::new_v4(), Vec::new(), address())
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));

        let svc = service(MockProducts::new(), MockOrders::new());
        let duplicate = vec![
            CheckoutItem {
                product_id: id,
                quantity: 1,
            },
            CheckoutItem {
                product_id: id,
                quantity: 2,
            },
        ];
        assert!(matches!(
            svc.create_order(Uuid::new_v4(), duplicate, address())
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn someone_elses_order_reads_as_not_found() {
        let order_id = Uuid::new_v4();
        let caller = Uuid::new_v4();

        let mut orders = MockOrders::new();
        orders
            .expect_find_for_user()
            .with(eq(order_id), eq(caller))
            .returning(|_, _| Ok(None));

        let svc = service(MockProducts::new(), orders);
        assert!(matches!(
            svc.get_order(order_id, caller, false).await.unwrap_err(),
            AppError::NotFound
        ));
    }

    #[tokio::test]
    async fn admins_can_read_any_users_order() {
        let order_id = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let admin = Uuid::new_v4();

        let mut orders = MockOrders::new();
        orders.expect_find_for_user().times(0);
        orders
            .expect_find_by_id()
            .with(eq(order_id))
            .returning(move |id| {
                Ok(Some(Order {
                    id,
                    user_id: buyer,
                    total: dec!(45.00),
                    status: crate::domain::OrderStatus::Pending,
                    payment_status: crate::domain::PaymentStatus::Pending,
                    payment_intent_id: None,
                    shipping_address: address(),
                    items: Vec::new(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                }))
            });

        let svc = service(MockProducts::new(), orders);
        let response = svc.get_order(order_id, admin, true).await.unwrap();
        assert_eq!(response.id, order_id);
    }
}
