//! Customer (library member) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// Default number of simultaneous loans for a new customer
pub const DEFAULT_MAX_BOOKS_ALLOWED: i32 = 5;

/// Membership status gating a customer's ability to borrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum MembershipStatus {
    Active = 1,
    Suspended = 2,
    Expired = 3,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "Active",
            MembershipStatus::Suspended => "Suspended",
            MembershipStatus::Expired => "Expired",
        }
    }
}

impl TryFrom<i16> for MembershipStatus {
    type Error = AppError;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(MembershipStatus::Active),
            2 => Ok(MembershipStatus::Suspended),
            3 => Ok(MembershipStatus::Expired),
            other => Err(AppError::Internal(format!("Unknown membership status {}", other))),
        }
    }
}

impl From<MembershipStatus> for i16 {
    fn from(s: MembershipStatus) -> Self {
        s as i16
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct CustomerRow {
    customer_id: i32,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    membership_date: DateTime<Utc>,
    membership_status: i16,
    max_books_allowed: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = AppError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            customer_id: row.customer_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            city: row.city,
            postal_code: row.postal_code,
            membership_date: row.membership_date,
            membership_status: MembershipStatus::try_from(row.membership_status)?,
            max_books_allowed: row.max_books_allowed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Full customer model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub membership_date: DateTime<Utc>,
    pub membership_status: MembershipStatus,
    /// Maximum number of books this customer can borrow simultaneously
    pub max_books_allowed: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_active(&self) -> bool {
        self.membership_status == MembershipStatus::Active
    }
}

/// Short customer representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub customer_id: i32,
    pub full_name: String,
    pub email: String,
    /// Membership status as text ("Active", "Suspended", "Expired")
    pub membership_status: String,
    pub membership_date: DateTime<Utc>,
}

impl From<Customer> for CustomerSummary {
    fn from(customer: Customer) -> Self {
        CustomerSummary {
            full_name: customer.full_name(),
            customer_id: customer.customer_id,
            email: customer.email,
            membership_status: customer.membership_status.to_string(),
            membership_date: customer.membership_date,
        }
    }
}

/// Create customer request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomer {
    #[validate(length(min = 1, max = 100, message = "First name must be between 1 and 100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name must be between 1 and 100 characters"))]
    pub last_name: String,
    /// Must be unique
    #[validate(
        email(message = "Invalid email address format"),
        length(max = 200, message = "Email cannot be longer than 200 characters")
    )]
    pub email: String,
    #[validate(length(max = 20, message = "Phone number cannot be longer than 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 300, message = "Address cannot be longer than 300 characters"))]
    pub address: Option<String>,
    #[validate(length(max = 100, message = "City cannot be longer than 100 characters"))]
    pub city: Option<String>,
    #[validate(length(max = 20, message = "Postal code cannot be longer than 20 characters"))]
    pub postal_code: Option<String>,
    /// Defaults to 5
    #[validate(range(min = 1, max = 100, message = "Max books allowed must be between 1 and 100"))]
    pub max_books_allowed: Option<i32>,
}

/// Update membership status request
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMembershipStatus {
    pub membership_status: MembershipStatus,
}
