//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion.
//!
//! All services use Unit of Work pattern for centralized repository
//! access.

mod auth_service;
pub mod container;
mod order_service;
mod payment_service;
mod product_service;
mod user_service;

// Service Container
pub use container::Services;

// Service traits and implementations
pub use auth_service::{AuthService, Authenticator, Claims, TokenResponse};
pub use order_service::{CheckoutItem, OrderManager, OrderService};
pub use payment_service::{
    PaymentIntentResponse, PaymentProcessor, PaymentService, StripeSyncResponse, WebhookAck,
};
pub use product_service::{
    CatalogQuery, CreateProductInput, ProductManager, ProductService, UpdateProductInput,
};
pub use user_service::{UserManager, UserService};
