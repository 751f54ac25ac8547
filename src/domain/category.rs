//! Category domain entity.
//!
//! Categories are referenced by products for storefront filtering;
//! they are never owned by a product.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Category domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    /// Unique URL-safe lookup key derived from the name
    pub slug: String,
    pub description: Option<String>,
}

/// Compact category view embedded in product responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategorySummary {
    pub id: Uuid,
    #[schema(example = "Blankets")]
    pub name: String,
    #[schema(example = "blankets")]
    pub slug: String,
}

impl From<Category> for CategorySummary {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            slug: category.slug,
        }
    }
}
