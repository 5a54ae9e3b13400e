//! Customers repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::customer::{
        CreateCustomer, Customer, CustomerRow, MembershipStatus, DEFAULT_MAX_BOOKS_ALLOWED,
    },
};

use super::{sql_state, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};

pub(crate) const CUSTOMER_COLUMNS: &str = r#"
    customer_id, first_name, last_name, email, phone, address, city, postal_code,
    membership_date, membership_status, max_books_allowed, created_at, updated_at
"#;

#[derive(Clone)]
pub struct CustomersRepository {
    pool: Pool<Postgres>,
}

impl CustomersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get customer by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE customer_id = $1",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// List all customers ordered by name
    pub async fn list(&self) -> AppResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers ORDER BY last_name, first_name, customer_id",
            CUSTOMER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Customer::try_from).collect()
    }

    /// Case-insensitive email lookup
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM customers WHERE LOWER(email) = LOWER($1))",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Create a new customer with an Active membership starting at `now`
    pub async fn create(&self, customer: &CreateCustomer, now: DateTime<Utc>) -> AppResult<Customer> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            INSERT INTO customers (first_name, last_name, email, phone, address, city,
                                   postal_code, membership_date, membership_status,
                                   max_books_allowed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.postal_code)
        .bind(now)
        .bind(i16::from(MembershipStatus::Active))
        .bind(customer.max_books_allowed.unwrap_or(DEFAULT_MAX_BOOKS_ALLOWED))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match sql_state(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => AppError::Validation(format!(
                "A customer with email '{}' already exists.",
                customer.email
            )),
            _ => AppError::Database(e),
        })?;

        Customer::try_from(row)
    }

    /// Delete a customer. Customers still referenced by loans cannot be deleted.
    pub async fn delete(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE customer_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match sql_state(&e).as_deref() {
                Some(FOREIGN_KEY_VIOLATION) => AppError::Conflict(format!(
                    "Customer with ID {} has loans and cannot be deleted",
                    id
                )),
                _ => AppError::Database(e),
            })?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_membership_status(
        &self,
        id: i32,
        status: MembershipStatus,
    ) -> AppResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            UPDATE customers SET membership_status = $1, updated_at = NOW()
            WHERE customer_id = $2
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(i16::from(status))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }
}
