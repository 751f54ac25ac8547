//! Order repository - order persistence and the inventory-consistency
//! critical path.
//!
//! The two multi-step writes (checkout, webhook settlement) run inside a
//! single database transaction with explicit commit/rollback, and the
//! inventory mutations are guarded so concurrent checkouts cannot oversell.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use super::entities::order::{self, Entity as OrderEntity};
use super::entities::order_item::{self, Entity as OrderItemEntity};
use super::entities::product::{self, Entity as ProductEntity};
use crate::domain::{
    NewOrder, Order, OrderItem, OrderStatus, PaymentOutcome, PaymentStatus, ProductSummary,
    ShippingAddress,
};
use crate::errors::{AppError, AppResult};
use crate::types::{PaginationParams, SortOrder};

/// Whitelisted sort fields for the admin order listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSortBy {
    CreatedAt,
    Total,
    Status,
}

impl OrderSortBy {
    fn column(self) -> order::Column {
        match self {
            OrderSortBy::CreatedAt => order::Column::CreatedAt,
            OrderSortBy::Total => order::Column::Total,
            OrderSortBy::Status => order::Column::Status,
        }
    }
}

/// Filter applied to the admin order listing
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub sort_by: OrderSortBy,
    pub sort_order: SortOrder,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            status: None,
            payment_status: None,
            sort_by: OrderSortBy::CreatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

/// Repository trait for order persistence
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Find any order by id (admin view)
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>>;

    /// Find an order only if it belongs to `user_id`
    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Order>>;

    /// Page of the caller's orders, newest first
    async fn list_for_user(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Order>, u64)>;

    /// Filtered, sorted, paginated admin listing
    async fn list(
        &self,
        filter: &OrderFilter,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Order>, u64)>;

    /// Persist the order with its line items and decrement inventory,
    /// all in one transaction. Each decrement is guarded by the current
    /// stock level; a failing guard rolls the whole checkout back with
    /// `InsufficientInventory`.
    async fn create_with_items(&self, data: NewOrder) -> AppResult<Order>;

    /// Record the payment-intent reference and flip the order to
    /// PROCESSING, conditional on it still being PENDING. Returns false
    /// when the condition did not hold (lost race or wrong state).
    async fn begin_payment(&self, order_id: Uuid, intent_id: &str) -> AppResult<bool>;

    /// Apply a processor outcome to the order: set the terminal
    /// payment/fulfillment pair and, for failed/cancelled payments,
    /// restore each line's quantity onto its product. Idempotent: returns
    /// false without touching anything when the order is already in a
    /// terminal payment state (or does not exist).
    async fn settle_payment(&self, order_id: Uuid, outcome: PaymentOutcome) -> AppResult<bool>;
}

/// SeaORM-backed implementation of [`OrderRepository`]
pub struct OrderStore {
    db: DatabaseConnection,
}

impl OrderStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Attach line items and product summaries to a page of order rows
    async fn hydrate<C: ConnectionTrait>(
        conn: &C,
        models: Vec<order::Model>,
    ) -> AppResult<Vec<Order>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let item_models = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(conn)
            .await?;

        let product_ids: Vec<Uuid> = item_models.iter().map(|i| i.product_id).collect();
        let summaries: HashMap<Uuid, ProductSummary> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            ProductEntity::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(conn)
                .await?
                .into_iter()
                .map(|m| {
                    let p = crate::domain::Product::from(m);
                    (p.id, ProductSummary::from(&p))
                })
                .collect()
        };

        let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in item_models {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderItem {
                    id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                    product: summaries.get(&item.product_id).cloned(),
                });
        }

        models
            .into_iter()
            .map(|m| {
                let items = items_by_order.remove(&m.id).unwrap_or_default();
                Self::into_domain(m, items)
            })
            .collect()
    }

    fn into_domain(model: order::Model, items: Vec<OrderItem>) -> AppResult<Order> {
        let shipping_address: ShippingAddress = serde_json::from_value(model.shipping_address)
            .map_err(|e| AppError::internal(format!("Corrupt shipping address: {}", e)))?;

        Ok(Order {
            id: model.id,
            user_id: model.user_id,
            total: model.total,
            status: OrderStatus::parse(&model.status)?,
            payment_status: PaymentStatus::parse(&model.payment_status)?,
            payment_intent_id: model.payment_intent_id,
            shipping_address,
            created_at: model.created_at,
            updated_at: model.updated_at,
            items,
        })
    }

    async fn find_one(
        &self,
        id: Uuid,
        user_id: Option<Uuid>,
    ) -> AppResult<Option<Order>> {
        let mut query = OrderEntity::find_by_id(id);
        if let Some(user_id) = user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }

        let Some(model) = query.one(&self.db).await? else {
            return Ok(None);
        };

        let mut orders = Self::hydrate(&self.db, vec![model]).await?;
        Ok(orders.pop())
    }

    /// Guarded inventory decrement; fails the checkout when stock ran out
    /// between validation and commit.
    async fn decrement_inventory(
        txn: &DatabaseTransaction,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<()> {
        let result = ProductEntity::update_many()
            .col_expr(
                product::Column::Inventory,
                Expr::col(product::Column::Inventory).sub(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Inventory.gte(quantity))
            .exec(txn)
            .await?;

        if result.rows_affected == 0 {
            // Re-read for a precise error message
            let current = ProductEntity::find_by_id(product_id).one(txn).await?;
            return Err(match current {
                Some(p) => AppError::InsufficientInventory {
                    name: p.name,
                    available: p.inventory,
                    requested: quantity,
                },
                None => AppError::ProductUnavailable,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl OrderRepository for OrderStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>> {
        self.find_one(id, None).await
    }

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Option<Order>> {
        self.find_one(id, Some(user_id)).await
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Order>, u64)> {
        let paginator = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&self.db, params.limit());

        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(params.page_index()).await?;

        Ok((Self::hydrate(&self.db, models).await?, total))
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Order>, u64)> {
        let mut query = OrderEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status.as_str()));
        }
        if let Some(payment_status) = filter.payment_status {
            query = query.filter(order::Column::PaymentStatus.eq(payment_status.as_str()));
        }

        let direction = match filter.sort_order {
            SortOrder::Asc => sea_orm::Order::Asc,
            SortOrder::Desc => sea_orm::Order::Desc,
        };

        let paginator = query
            .order_by(filter.sort_by.column(), direction)
            .paginate(&self.db, params.limit());

        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(params.page_index()).await?;

        Ok((Self::hydrate(&self.db, models).await?, total))
    }

    async fn create_with_items(&self, data: NewOrder) -> AppResult<Order> {
        let txn = self.db.begin().await?;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let result: AppResult<order::Model> = async {
            let shipping = serde_json::to_value(&data.shipping_address)
                .map_err(|e| AppError::internal(format!("Address serialization: {}", e)))?;

            let order_model = order::ActiveModel {
                id: Set(order_id),
                user_id: Set(data.user_id),
                total: Set(data.total),
                status: Set(OrderStatus::Pending.as_str().to_string()),
                payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
                payment_intent_id: Set(None),
                shipping_address: Set(shipping),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;

            let item_models: Vec<order_item::ActiveModel> = data
                .items
                .iter()
                .map(|item| order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    product_id: Set(item.product_id),
                    quantity: Set(item.quantity),
                    price: Set(item.price),
                })
                .collect();
            OrderItemEntity::insert_many(item_models).exec(&txn).await?;

            for item in &data.items {
                Self::decrement_inventory(&txn, item.product_id, item.quantity).await?;
            }

            Ok(order_model)
        }
        .await;

        match result {
            Ok(model) => {
                txn.commit().await?;
                let mut orders = Self::hydrate(&self.db, vec![model]).await?;
                orders.pop().ok_or_else(|| {
                    AppError::internal("Order vanished immediately after creation")
                })
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Checkout rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn begin_payment(&self, order_id: Uuid, intent_id: &str) -> AppResult<bool> {
        let result = OrderEntity::update_many()
            .col_expr(
                order::Column::PaymentIntentId,
                Expr::value(Some(intent_id.to_string())),
            )
            .col_expr(
                order::Column::PaymentStatus,
                Expr::value(PaymentStatus::Processing.as_str()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending.as_str()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn settle_payment(&self, order_id: Uuid, outcome: PaymentOutcome) -> AppResult<bool> {
        let txn = self.db.begin().await?;

        let result: AppResult<bool> = async {
            let Some(model) = OrderEntity::find_by_id(order_id).one(&txn).await? else {
                return Ok(false);
            };

            // Replays land here: once terminal, nothing moves again.
            if PaymentStatus::parse(&model.payment_status)?.is_terminal() {
                return Ok(false);
            }

            if outcome.restores_inventory() {
                let items = OrderItemEntity::find()
                    .filter(order_item::Column::OrderId.eq(order_id))
                    .all(&txn)
                    .await?;

                for item in items {
                    ProductEntity::update_many()
                        .col_expr(
                            product::Column::Inventory,
                            Expr::col(product::Column::Inventory).add(item.quantity),
                        )
                        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
                        .filter(product::Column::Id.eq(item.product_id))
                        .exec(&txn)
                        .await?;
                }
            }

            let (payment_status, status) = outcome.target_states();
            let mut active: order::ActiveModel = model.into();
            active.payment_status = Set(payment_status.as_str().to_string());
            active.status = Set(status.as_str().to_string());
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;

            Ok(true)
        }
        .await;

        match result {
            Ok(applied) => {
                txn.commit().await?;
                Ok(applied)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Settlement rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}
