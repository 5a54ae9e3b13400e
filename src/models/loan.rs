//! Loan model and related types

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use utoipa::ToSchema;

use crate::error::AppError;

/// Fixed loan period
pub const LOAN_PERIOD_DAYS: i64 = 14;

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum LoanStatus {
    Active = 1,
    Returned = 2,
    Overdue = 3,
    Lost = 4,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "Active",
            LoanStatus::Returned => "Returned",
            LoanStatus::Overdue => "Overdue",
            LoanStatus::Lost => "Lost",
        }
    }
}

impl TryFrom<i16> for LoanStatus {
    type Error = AppError;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(LoanStatus::Active),
            2 => Ok(LoanStatus::Returned),
            3 => Ok(LoanStatus::Overdue),
            4 => Ok(LoanStatus::Lost),
            other => Err(AppError::Internal(format!("Unknown loan status {}", other))),
        }
    }
}

impl From<LoanStatus> for i16 {
    fn from(s: LoanStatus) -> Self {
        s as i16
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct LoanRow {
    loan_id: i32,
    customer_id: i32,
    book_id: i32,
    loan_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    status: i16,
    renewal_count: i32,
    late_fee: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LoanRow {
    pub fn book_id(&self) -> i32 {
        self.book_id
    }
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        Ok(Loan {
            loan_id: row.loan_id,
            customer_id: row.customer_id,
            book_id: row.book_id,
            loan_date: row.loan_date,
            due_date: row.due_date,
            return_date: row.return_date,
            status: LoanStatus::try_from(row.status)?,
            renewal_count: row.renewal_count,
            late_fee: row.late_fee,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Loan model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub loan_id: i32,
    pub customer_id: i32,
    pub book_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// Set once the book is back
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub renewal_count: i32,
    pub late_fee: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

/// Loan about to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoan {
    pub customer_id: i32,
    pub book_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl NewLoan {
    /// Due date is always `loan_date` plus the loan period
    pub fn new(customer_id: i32, book_id: i32, loan_date: DateTime<Utc>) -> Self {
        NewLoan {
            customer_id,
            book_id,
            loan_date,
            due_date: loan_date + Duration::days(LOAN_PERIOD_DAYS),
        }
    }
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    pub customer_id: i32,
    pub book_id: i32,
}

/// Loan record returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanResponse {
    pub loan_id: i32,
    pub customer_id: i32,
    pub book_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: String,
}

impl From<&Loan> for LoanResponse {
    fn from(loan: &Loan) -> Self {
        LoanResponse {
            loan_id: loan.loan_id,
            customer_id: loan.customer_id,
            book_id: loan.book_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            status: loan.status.to_string(),
        }
    }
}

/// Reason a loan request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoanRejection {
    #[error("Book not found")]
    BookNotFound,
    #[error("Customer not found")]
    CustomerNotFound,
    #[error("Book is not available")]
    BookNotAvailable,
    #[error("Customer is not active")]
    CustomerNotActive,
    #[error("Customer reached the maximum number of active loans")]
    LoanLimitReached,
    #[error("Customer already has an active loan for this book")]
    DuplicateActiveLoan,
}

impl LoanRejection {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            LoanRejection::BookNotFound => "BOOK_NOT_FOUND",
            LoanRejection::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            LoanRejection::BookNotAvailable => "BOOK_NOT_AVAILABLE",
            LoanRejection::CustomerNotActive => "CUSTOMER_NOT_ACTIVE",
            LoanRejection::LoanLimitReached => "LOAN_LIMIT_REACHED",
            LoanRejection::DuplicateActiveLoan => "DUPLICATE_ACTIVE_LOAN",
        }
    }
}

/// Result of a loan request that reached a decision
#[derive(Debug, Clone, PartialEq)]
pub enum LoanOutcome {
    Approved(LoanResponse),
    Rejected(LoanRejection),
}

/// Result of the store's atomic loan commit
#[derive(Debug, Clone, PartialEq)]
pub enum LoanCommit {
    Created(Loan),
    /// A rule re-checked under lock no longer held
    Rejected(LoanRejection),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_due_date_is_fourteen_days_later() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let loan = NewLoan::new(1, 2, start);
        assert_eq!(loan.due_date - loan.loan_date, Duration::days(14));
        assert_eq!(loan.due_date, Utc.with_ymd_and_hms(2025, 3, 15, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_rejection_messages_and_codes() {
        assert_eq!(LoanRejection::BookNotFound.to_string(), "Book not found");
        assert_eq!(
            LoanRejection::LoanLimitReached.to_string(),
            "Customer reached the maximum number of active loans"
        );
        assert_eq!(
            LoanRejection::DuplicateActiveLoan.to_string(),
            "Customer already has an active loan for this book"
        );
        assert_eq!(LoanRejection::CustomerNotActive.code(), "CUSTOMER_NOT_ACTIVE");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(LoanStatus::try_from(2).unwrap(), LoanStatus::Returned);
        assert!(LoanStatus::try_from(0).is_err());
        assert_eq!(LoanStatus::Lost.to_string(), "Lost");
    }
}
