//! Business logic services

pub mod borrowings;
pub mod catalog;
pub mod email;
pub mod fines;
pub mod gateway;
pub mod notifications;
pub mod payments;

use std::sync::Arc;

use crate::{config::PaymentsConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub borrowings: borrowings::BorrowingsService,
    pub payments: payments::PaymentsService,
    repository: Repository,
}

impl Services {
    /// Create all services over one repository and its collaborators
    pub fn new(
        repository: Repository,
        gateway: Arc<dyn gateway::PaymentGateway>,
        notifications: notifications::NotificationService,
        payments_config: &PaymentsConfig,
    ) -> Self {
        let payments = payments::PaymentsService::new(
            repository.clone(),
            gateway,
            payments::RedirectUrls::from_config(payments_config),
        );

        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            borrowings: borrowings::BorrowingsService::new(repository.clone(), payments.clone(), notifications),
            payments,
            repository,
        }
    }

    /// Readiness probe for the storage backend
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
