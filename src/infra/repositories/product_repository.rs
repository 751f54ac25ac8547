//! Product repository - catalog persistence with filtered listings and
//! soft delete.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::product::{self, Entity as ProductEntity};
use crate::domain::{NewProduct, Product, ProductUpdate};
use crate::errors::{AppError, AppResult};
use crate::types::{PaginationParams, SortOrder};

/// Whitelisted sort fields for product listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
}

impl ProductSortBy {
    fn column(self) -> product::Column {
        match self {
            ProductSortBy::CreatedAt => product::Column::CreatedAt,
            ProductSortBy::Price => product::Column::Price,
            ProductSortBy::Name => product::Column::Name,
        }
    }
}

/// Filter applied to product listings
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub is_active: Option<bool>,
    pub category_id: Option<Uuid>,
    /// Substring match against name or description
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort_by: ProductSortBy,
    pub sort_order: SortOrder,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            is_active: Some(true),
            category_id: None,
            search: None,
            min_price: None,
            max_price: None,
            sort_by: ProductSortBy::CreatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

/// Repository trait for product persistence
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>>;

    /// Check whether a slug is used by any product other than `exclude`
    async fn slug_taken(&self, slug: &str, exclude: Option<Uuid>) -> AppResult<bool>;

    /// Batch fetch of active products by id (order placement step 3)
    async fn find_active_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Product>>;

    /// Filtered, sorted, paginated listing; returns (page, total count)
    async fn list(
        &self,
        filter: &ProductFilter,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Product>, u64)>;

    async fn create(&self, data: NewProduct) -> AppResult<Product>;

    /// Apply a partial update; `NotFound` if the product does not exist
    async fn update(&self, id: Uuid, patch: ProductUpdate) -> AppResult<Product>;

    /// Soft delete: flip `is_active` off, never remove the row
    async fn deactivate(&self, id: Uuid) -> AppResult<()>;

    /// Persist (or clear) the payment-processor product/price references
    async fn set_stripe_refs(
        &self,
        id: Uuid,
        stripe_product_id: Option<String>,
        stripe_price_id: Option<String>,
    ) -> AppResult<Product>;
}

/// SeaORM-backed implementation of [`ProductRepository`]
pub struct ProductStore {
    db: DatabaseConnection,
}

impl ProductStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn apply_filter(filter: &ProductFilter) -> Condition {
        let mut condition = Condition::all();

        if let Some(is_active) = filter.is_active {
            condition = condition.add(product::Column::IsActive.eq(is_active));
        }
        if let Some(category_id) = filter.category_id {
            condition = condition.add(product::Column::CategoryId.eq(category_id));
        }
        if let Some(search) = filter.search.as_deref() {
            // Case-insensitive substring match across name and description
            let pattern = format!("%{}%", search);
            condition = condition.add(
                Condition::any()
                    .add(Expr::col(product::Column::Name).ilike(pattern.clone()))
                    .add(Expr::col(product::Column::Description).ilike(pattern)),
            );
        }
        if let Some(min) = filter.min_price {
            condition = condition.add(product::Column::Price.gte(min));
        }
        if let Some(max) = filter.max_price {
            condition = condition.add(product::Column::Price.lte(max));
        }

        condition
    }
}

#[async_trait]
impl ProductRepository for ProductStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Product>> {
        let result = ProductEntity::find_by_id(id).one(&self.db).await?;
        Ok(result.map(Product::from))
    }

    async fn slug_taken(&self, slug: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let mut query = ProductEntity::find().filter(product::Column::Slug.eq(slug));
        if let Some(id) = exclude {
            query = query.filter(product::Column::Id.ne(id));
        }
        Ok(query.one(&self.db).await?.is_some())
    }

    async fn find_active_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = ProductEntity::find()
            .filter(product::Column::Id.is_in(ids.iter().copied()))
            .filter(product::Column::IsActive.eq(true))
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Product::from).collect())
    }

    async fn list(
        &self,
        filter: &ProductFilter,
        params: &PaginationParams,
    ) -> AppResult<(Vec<Product>, u64)> {
        let order = match filter.sort_order {
            SortOrder::Asc => sea_orm::Order::Asc,
            SortOrder::Desc => sea_orm::Order::Desc,
        };

        let paginator = ProductEntity::find()
            .filter(Self::apply_filter(filter))
            .order_by(filter.sort_by.column(), order)
            .paginate(&self.db, params.limit());

        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(params.page_index()).await?;

        Ok((models.into_iter().map(Product::from).collect(), total))
    }

    async fn create(&self, data: NewProduct) -> AppResult<Product> {
        let now = Utc::now();
        let active = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(data.name),
            slug: Set(data.slug),
            description: Set(data.description),
            price: Set(data.price),
            inventory: Set(data.inventory),
            is_active: Set(data.is_active),
            category_id: Set(data.category_id),
            images: Set(serde_json::json!(data.images)),
            metadata: Set(data.metadata),
            stripe_product_id: Set(None),
            stripe_price_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active.insert(&self.db).await?;
        Ok(Product::from(model))
    }

    async fn update(&self, id: Uuid, patch: ProductUpdate) -> AppResult<Product> {
        let found = ProductEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: product::ActiveModel = found.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(slug) = patch.slug {
            active.slug = Set(slug);
        }
        if let Some(description) = patch.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = patch.price {
            active.price = Set(price);
        }
        if let Some(inventory) = patch.inventory {
            active.inventory = Set(inventory);
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(category_id) = patch.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(images) = patch.images {
            active.images = Set(serde_json::json!(images));
        }
        if let Some(metadata) = patch.metadata {
            active.metadata = Set(Some(metadata));
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Product::from(model))
    }

    async fn deactivate(&self, id: Uuid) -> AppResult<()> {
        let found = ProductEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: product::ActiveModel = found.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;

        Ok(())
    }

    async fn set_stripe_refs(
        &self,
        id: Uuid,
        stripe_product_id: Option<String>,
        stripe_price_id: Option<String>,
    ) -> AppResult<Product> {
        let found = ProductEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: product::ActiveModel = found.into();
        active.stripe_product_id = Set(stripe_product_id);
        active.stripe_price_id = Set(stripe_price_id);
        active.updated_at = Set(Utc::now());

        let model = active.update(&self.db).await?;
        Ok(Product::from(model))
    }
}
