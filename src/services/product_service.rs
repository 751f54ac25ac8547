//! Product service - Handles catalog business logic.
//!
//! SOLID (SRP): Catalog use cases only; payment mirroring lives in the
//! payment service.
//! DDD: Orchestrates domain operations via Unit of Work.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    slugify, CategorySummary, NewProduct, ProductResponse, ProductUpdate,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::repositories::{ProductFilter, ProductSortBy};
use crate::infra::UnitOfWork;
use crate::types::{Paginated, PaginationParams, SortOrder};

/// Client-facing catalog query, before category slugs are resolved
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    pub category_slug: Option<String>,
    pub search: Option<String>,
    /// Active/inactive filter; only honored for admin callers
    pub is_active: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

/// Fields accepted when creating a product
#[derive(Debug, Clone)]
pub struct CreateProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub inventory: i32,
    pub category_id: Option<Uuid>,
    pub images: Vec<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Fields accepted when updating a product
#[derive(Debug, Clone, Default)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub inventory: Option<i32>,
    pub is_active: Option<bool>,
    pub category_id: Option<Uuid>,
    pub images: Option<Vec<String>>,
    pub metadata: Option<serde_json::Value>,
}

/// Product service trait for dependency injection.
#[async_trait]
pub trait ProductService: Send + Sync {
    /// Paginated catalog listing. Non-admins only see active products.
    async fn list_products(
        &self,
        query: CatalogQuery,
        params: PaginationParams,
        include_inactive: bool,
    ) -> AppResult<Paginated<ProductResponse>>;

    /// Fetch one product. Inactive products are `NotFound` to non-admins.
    async fn get_product(&self, id: Uuid, include_inactive: bool) -> AppResult<ProductResponse>;

    /// Create a product with a slug derived from its name
    async fn create_product(&self, input: CreateProductInput) -> AppResult<ProductResponse>;

    /// Partial update; renaming re-derives the slug
    async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<ProductResponse>;

    /// Soft delete: the product stays referenced by past orders
    async fn delete_product(&self, id: Uuid) -> AppResult<()>;
}

/// Concrete implementation of ProductService using Unit of Work.
pub struct ProductManager<U: UnitOfWork> {
    uow: Arc<U>,
}

impl<U: UnitOfWork> ProductManager<U> {
    /// Create new product service instance with Unit of Work
    pub fn new(uow: Arc<U>) -> Self {
        Self { uow }
    }

    /// Attach category summaries to a page of products
    async fn with_categories(
        &self,
        products: Vec<crate::domain::Product>,
    ) -> AppResult<Vec<ProductResponse>> {
        let category_ids: Vec<Uuid> = {
            let mut ids: Vec<Uuid> = products.iter().filter_map(|p| p.category_id).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };

        let categories: HashMap<Uuid, CategorySummary> = self
            .uow
            .categories()
            .find_by_ids(&category_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, CategorySummary::from(c)))
            .collect();

        Ok(products
            .into_iter()
            .map(|p| {
                let category = p.category_id.and_then(|id| categories.get(&id).cloned());
                ProductResponse::from_parts(p, category)
            })
            .collect())
    }
}

#[async_trait]
impl<U: UnitOfWork> ProductService for ProductManager<U> {
    async fn list_products(
        &self,
        query: CatalogQuery,
        params: PaginationParams,
        include_inactive: bool,
    ) -> AppResult<Paginated<ProductResponse>> {
        // Category slugs resolve to ids up front; an unknown slug yields
        // an empty page rather than an error
        let category_id = match query.category_slug {
            Some(ref slug) => match self.uow.categories().find_by_slug(slug).await? {
                Some(category) => Some(category.id),
                None => {
                    return Ok(Paginated::new(Vec::new(), params.page, params.limit(), 0));
                }
            },
            None => None,
        };

        let filter = ProductFilter {
            // Shoppers always get the active slice; admins may narrow it
            is_active: if include_inactive { query.is_active } else { Some(true) },
            category_id,
            search: query.search,
            min_price: query.min_price,
            max_price: query.max_price,
            sort_by: query.sort_by.unwrap_or(ProductSortBy::CreatedAt),
            sort_order: query.sort_order.unwrap_or_default(),
        };

        let (products, total) = self.uow.products().list(&filter, &params).await?;
        let responses = self.with_categories(products).await?;

        Ok(Paginated::new(responses, params.page, params.limit(), total))
    }

    async fn get_product(&self, id: Uuid, include_inactive: bool) -> AppResult<ProductResponse> {
        let product = self.uow.products().find_by_id(id).await?.ok_or_not_found()?;

        // Inactive products are invisible outside the admin surface
        if !product.is_active && !include_inactive {
            return Err(AppError::NotFound);
        }

        let mut responses = self.with_categories(vec![product]).await?;
        responses.pop().ok_or(AppError::NotFound)
    }

    async fn create_product(&self, input: CreateProductInput) -> AppResult<ProductResponse> {
        if let Some(category_id) = input.category_id {
            self.uow
                .categories()
                .find_by_id(category_id)
                .await?
                .ok_or(AppError::validation("Category does not exist"))?;
        }

        let slug = slugify(&input.name);
        if self.uow.products().slug_taken(&slug, None).await? {
            return Err(AppError::conflict("Product with this name"));
        }

        let product = self
            .uow
            .products()
            .create(NewProduct {
                name: input.name,
                slug,
                description: input.description,
                price: input.price,
                inventory: input.inventory,
                is_active: true,
                category_id: input.category_id,
                images: input.images,
                metadata: input.metadata,
            })
            .await?;

        let mut responses = self.with_categories(vec![product]).await?;
        responses.pop().ok_or(AppError::NotFound)
    }

    async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<ProductResponse> {
        if let Some(category_id) = input.category_id {
            self.uow
                .categories()
                .find_by_id(category_id)
                .await?
                .ok_or(AppError::validation("Category does not exist"))?;
        }

        // A renamed product gets a fresh slug, with the same uniqueness
        // rule as creation
        let slug = match input.name {
            Some(ref name) => {
                let slug = slugify(name);
                if self.uow.products().slug_taken(&slug, Some(id)).await? {
                    return Err(AppError::conflict("Product with this name"));
                }
                Some(slug)
            }
            None => None,
        };

        let product = self
            .uow
            .products()
            .update(
                id,
                ProductUpdate {
                    name: input.name,
                    slug,
                    description: input.description,
                    price: input.price,
                    inventory: input.inventory,
                    is_active: input.is_active,
                    category_id: input.category_id,
                    images: input.images,
                    metadata: input.metadata,
                },
            )
            .await?;

        let mut responses = self.with_categories(vec![product]).await?;
        responses.pop().ok_or(AppError::NotFound)
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<()> {
        self.uow.products().find_by_id(id).await?.ok_or_not_found()?;
        self.uow.products().deactivate(id).await
    }
}
