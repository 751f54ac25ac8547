//! Domain layer - Core business entities and logic
//!
//! This module contains the core domain models that represent
//! business concepts independent of infrastructure concerns.
//!
//! DDD: Domain layer has NO external dependencies (except error types).

pub mod category;
pub mod order;
pub mod password;
pub mod product;
pub mod slug;
pub mod user;

pub use category::{Category, CategorySummary};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderItemResponse, OrderResponse, OrderStatus,
    PaymentOutcome, PaymentStatus, ShippingAddress, UserSummary,
};
pub use password::Password;
pub use product::{NewProduct, Product, ProductResponse, ProductSummary, ProductUpdate};
pub use slug::slugify;
pub use user::{User, UserResponse, UserRole};
