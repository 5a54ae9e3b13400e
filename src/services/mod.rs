//! Business logic services

pub mod auth;
pub mod authors;
pub mod books;
pub mod customers;
pub mod loans;

use std::sync::Arc;

use mockable::Clock;

use crate::{config::AuthConfig, error::AppResult, repository::Store};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub authors: authors::AuthorsService,
    pub books: books::BooksService,
    pub customers: customers::CustomersService,
    pub loans: loans::LoansService,
    store: Arc<dyn Store>,
}

impl Services {
    /// Create all services over the given store
    pub fn new<S: Store + 'static>(store: Arc<S>, auth_config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let shared: Arc<dyn Store> = store.clone();
        Self {
            auth: auth::AuthService::new(shared.clone(), auth_config, clock.clone()),
            authors: authors::AuthorsService::new(shared.clone()),
            books: books::BooksService::new(shared.clone()),
            customers: customers::CustomersService::new(shared.clone(), clock.clone()),
            loans: loans::LoansService::new(store, clock),
            store: shared,
        }
    }

    /// Readiness of the underlying store
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
