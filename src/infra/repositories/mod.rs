//! Repository layer - Data access abstraction
//!
//! Repositories provide an abstraction over data persistence,
//! following the Repository pattern for clean separation of concerns.

pub(crate) mod entities;

mod category_repository;
mod order_repository;
mod product_repository;
mod user_repository;

pub use category_repository::{CategoryRepository, CategoryStore};
pub use order_repository::{OrderFilter, OrderRepository, OrderSortBy, OrderStore};
pub use product_repository::{ProductFilter, ProductRepository, ProductSortBy, ProductStore};
pub use user_repository::{UserRepository, UserStore};
