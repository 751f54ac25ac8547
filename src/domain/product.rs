//! Product domain entity and related types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::category::CategorySummary;

/// Product domain entity.
///
/// "Deleting" a product only flips `is_active`; the row survives so that
/// historical order items keep a valid reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Unique URL-safe lookup key derived from the name
    pub slug: String,
    pub description: Option<String>,
    /// Unit price, two decimal places
    pub price: Decimal,
    /// Units on hand, never negative
    pub inventory: i32,
    pub is_active: bool,
    pub category_id: Option<Uuid>,
    /// Ordered list of image URLs
    pub images: Vec<String>,
    /// Open key/value bag for storefront extras
    pub metadata: Option<serde_json::Value>,
    /// External payment-processor product reference, set once mirrored
    pub stripe_product_id: Option<String>,
    /// External payment-processor price reference
    pub stripe_price_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for inserting a new product
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub inventory: i32,
    pub is_active: bool,
    pub category_id: Option<Uuid>,
    pub images: Vec<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update applied to an existing product.
///
/// `slug` is set by the service when the name changes, never by clients.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub inventory: Option<i32>,
    pub is_active: Option<bool>,
    pub category_id: Option<Uuid>,
    pub images: Option<Vec<String>>,
    pub metadata: Option<serde_json::Value>,
}

/// Product response (float-serialized price for clients)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    #[schema(example = "Rainbow Baby Blanket")]
    pub name: String,
    #[schema(example = "rainbow-baby-blanket")]
    pub slug: String,
    pub description: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 49.99)]
    pub price: Decimal,
    pub inventory: i32,
    pub is_active: bool,
    #[schema(value_type = Option<CategorySummary>)]
    pub category: Option<CategorySummary>,
    pub images: Vec<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductResponse {
    /// Build a response from a product and its (optional) resolved category
    pub fn from_parts(product: Product, category: Option<CategorySummary>) -> Self {
        Self {
            id: product.id,
            name: product.name,
            slug: product.slug,
            description: product.description,
            price: product.price,
            inventory: product.inventory,
            is_active: product.is_active,
            category,
            images: product.images,
            metadata: product.metadata,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// Compact product view embedded in order line items
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub images: Vec<String>,
}

impl From<&Product> for ProductSummary {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            images: product.images.clone(),
        }
    }
}
