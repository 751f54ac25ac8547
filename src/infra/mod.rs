//! Infrastructure layer - External systems integration
//!
//! This module handles all external system concerns:
//! - Database connections and repositories
//! - Payment processor client
//! - Unit of Work for repository access

pub mod db;
pub mod payment;
pub mod repositories;
pub mod unit_of_work;

pub use db::{Database, Migrator};
pub use payment::{PaymentGateway, PaymentIntent, StripeGateway, WebhookEvent};
pub use repositories::{
    CategoryRepository, OrderFilter, OrderRepository, ProductFilter, ProductRepository,
    UserRepository,
};
pub use unit_of_work::{Persistence, UnitOfWork};
