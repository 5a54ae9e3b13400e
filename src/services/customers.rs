//! Customer management service

use std::sync::Arc;

use mockable::Clock;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::customer::{CreateCustomer, Customer, CustomerSummary, MembershipStatus},
    repository::Store,
};

#[derive(Clone)]
pub struct CustomersService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl CustomersService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list_customers(&self) -> AppResult<Vec<CustomerSummary>> {
        let customers = self.store.list_customers().await?;
        Ok(customers.into_iter().map(CustomerSummary::from).collect())
    }

    /// Register a new library member
    pub async fn create_customer(&self, customer: CreateCustomer) -> AppResult<Customer> {
        customer.validate()?;

        if self.store.email_exists(&customer.email).await? {
            return Err(AppError::Validation(format!(
                "A customer with email '{}' already exists.",
                customer.email
            )));
        }

        let created = self.store.insert_customer(&customer, self.clock.utc()).await?;
        tracing::info!(customer_id = created.customer_id, "Customer created");
        Ok(created)
    }

    pub async fn delete_customer(&self, customer_id: i32) -> AppResult<()> {
        if !self.store.delete_customer(customer_id).await? {
            return Err(not_found(customer_id));
        }
        tracing::info!(customer_id, "Customer deleted");
        Ok(())
    }

    pub async fn update_membership_status(
        &self,
        customer_id: i32,
        status: MembershipStatus,
    ) -> AppResult<Customer> {
        let customer = self
            .store
            .update_membership_status(customer_id, status)
            .await?
            .ok_or_else(|| not_found(customer_id))?;
        tracing::info!(customer_id, status = %status, "Membership status updated");
        Ok(customer)
    }
}

fn not_found(customer_id: i32) -> AppError {
    AppError::NotFound(format!("Customer with ID {} not found", customer_id))
}
