//! Service Container - Centralized service access.
//!
//! SOLID (SRP): Manages service lifecycle and access.
//! SOLID (DIP): Depends on service traits, not implementations.

use std::sync::Arc;

use super::{AuthService, OrderService, PaymentService, ProductService, UserService};
use crate::config::Config;
use crate::infra::{Persistence, StripeGateway};

/// Concrete service container wired against the database and processor
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    user_service: Arc<dyn UserService>,
    product_service: Arc<dyn ProductService>,
    order_service: Arc<dyn OrderService>,
    payment_service: Arc<dyn PaymentService>,
}

impl Services {
    /// Create a new service container with all services initialized
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        user_service: Arc<dyn UserService>,
        product_service: Arc<dyn ProductService>,
        order_service: Arc<dyn OrderService>,
        payment_service: Arc<dyn PaymentService>,
    ) -> Self {
        Self {
            auth_service,
            user_service,
            product_service,
            order_service,
            payment_service,
        }
    }

    /// Create service container from database connection and config
    pub fn from_connection(db: sea_orm::DatabaseConnection, config: Config) -> Self {
        use super::{Authenticator, OrderManager, PaymentProcessor, ProductManager, UserManager};

        let uow = Arc::new(Persistence::new(db));
        let gateway = Arc::new(StripeGateway::new(config.stripe_secret_key.clone()));
        let webhook_secret = config.stripe_webhook_secret.clone();

        Self {
            auth_service: Arc::new(Authenticator::new(uow.clone(), config)),
            user_service: Arc::new(UserManager::new(uow.clone())),
            product_service: Arc::new(ProductManager::new(uow.clone())),
            order_service: Arc::new(OrderManager::new(uow.clone())),
            payment_service: Arc::new(PaymentProcessor::new(uow, gateway, webhook_secret)),
        }
    }

    pub fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    pub fn users(&self) -> Arc<dyn UserService> {
        self.user_service.clone()
    }

    pub fn products(&self) -> Arc<dyn ProductService> {
        self.product_service.clone()
    }

    pub fn orders(&self) -> Arc<dyn OrderService> {
        self.order_service.clone()
    }

    pub fn payments(&self) -> Arc<dyn PaymentService> {
        self.payment_service.clone()
    }
}
