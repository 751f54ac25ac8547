//! Application state - Dependency injection container.
//!
//! Provides centralized access to all application services and infrastructure.

use std::sync::Arc;

use crate::infra::Database;
use crate::services::{
    AuthService, OrderService, PaymentService, ProductService, Services, UserService,
};

/// Application state containing all services (DI container).
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth_service: Arc<dyn AuthService>,
    /// User service
    pub user_service: Arc<dyn UserService>,
    /// Product catalog service
    pub product_service: Arc<dyn ProductService>,
    /// Order service
    pub order_service: Arc<dyn OrderService>,
    /// Payment bridge service
    pub payment_service: Arc<dyn PaymentService>,
    /// Database connection
    pub database: Arc<Database>,
}

impl AppState {
    /// Create application state from database connection and config.
    pub fn from_config(database: Arc<Database>, config: crate::config::Config) -> Self {
        let container = Services::from_connection(database.connection(), config);

        Self {
            auth_service: container.auth(),
            user_service: container.users(),
            product_service: container.products(),
            order_service: container.orders(),
            payment_service: container.payments(),
            database,
        }
    }

}
