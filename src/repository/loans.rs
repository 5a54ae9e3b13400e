//! Loans repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        customer::MembershipStatus,
        loan::{Loan, LoanCommit, LoanRejection, LoanRow, LoanStatus, NewLoan},
    },
};

use super::{sql_state, UNIQUE_VIOLATION};

const LOAN_COLUMNS: &str = r#"
    loan_id, customer_id, book_id, loan_date, due_date, return_date, status,
    renewal_count, late_fee, created_at, updated_at
"#;

/// Attempts made when Postgres aborts a commit to resolve a conflict
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// serialization_failure, deadlock_detected
const RETRYABLE_STATES: [&str; 2] = ["40001", "40P01"];

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Option<Loan>> {
        let row = sqlx::query_as::<_, LoanRow>(&format!(
            "SELECT {} FROM loans WHERE loan_id = $1",
            LOAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Loan::try_from).transpose()
    }

    pub async fn count_active_for_customer(&self, customer_id: i32) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM loans WHERE customer_id = $1 AND status = $2",
        )
        .bind(customer_id)
        .bind(i16::from(LoanStatus::Active))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn has_active_for_customer_and_book(
        &self,
        customer_id: i32,
        book_id: i32,
    ) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE customer_id = $1 AND book_id = $2 AND status = $3)",
        )
        .bind(customer_id)
        .bind(book_id)
        .bind(i16::from(LoanStatus::Active))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Create a loan and take one copy of the book, retrying on serialization conflicts
    pub async fn create(&self, loan: &NewLoan) -> AppResult<LoanCommit> {
        let mut attempt = 1;
        loop {
            match self.try_create(loan).await {
                Err(AppError::Database(e)) if is_retryable(&e) && attempt < MAX_COMMIT_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        customer_id = loan.customer_id,
                        book_id = loan.book_id,
                        "Loan commit conflicted, retrying: {}",
                        e
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn try_create(&self, loan: &NewLoan) -> AppResult<LoanCommit> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent requests of the same customer
        let customer = sqlx::query_as::<_, (i32, i16)>(
            "SELECT max_books_allowed, membership_status FROM customers WHERE customer_id = $1 FOR UPDATE",
        )
        .bind(loan.customer_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((max_books, membership_status)) = customer else {
            return Ok(LoanCommit::Rejected(LoanRejection::CustomerNotFound));
        };

        // Conditional decrement: only one request can take the last copy
        let taken = sqlx::query(
            r#"
            UPDATE books SET available_copies = available_copies - 1, updated_at = NOW()
            WHERE book_id = $1 AND available_copies > 0
            "#,
        )
        .bind(loan.book_id)
        .execute(&mut *tx)
        .await?;

        if taken.rows_affected() == 0 {
            return Ok(LoanCommit::Rejected(LoanRejection::BookNotAvailable));
        }

        // Dropping the transaction on rejection also restores the copy
        if MembershipStatus::try_from(membership_status)? != MembershipStatus::Active {
            return Ok(LoanCommit::Rejected(LoanRejection::CustomerNotActive));
        }
        if let Some(rejection) = recheck_customer_rules(&mut tx, loan, max_books).await? {
            return Ok(LoanCommit::Rejected(rejection));
        }

        let inserted = sqlx::query_as::<_, LoanRow>(&format!(
            r#"
            INSERT INTO loans (customer_id, book_id, loan_date, due_date, status,
                               renewal_count, late_fee)
            VALUES ($1, $2, $3, $4, $5, 0, 0)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(loan.customer_id)
        .bind(loan.book_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(i16::from(LoanStatus::Active))
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) if sql_state(&e).as_deref() == Some(UNIQUE_VIOLATION) => {
                return Ok(LoanCommit::Rejected(LoanRejection::DuplicateActiveLoan));
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;

        Ok(LoanCommit::Created(Loan::try_from(row)?))
    }

    /// Close an Active loan and put the copy back on the shelf
    pub async fn mark_returned(&self, id: i32, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let status = sqlx::query_scalar::<_, i16>(
            "SELECT status FROM loans WHERE loan_id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;

        if LoanStatus::try_from(status)? != LoanStatus::Active {
            return Err(AppError::Conflict("Loan is not active".to_string()));
        }

        let row = sqlx::query_as::<_, LoanRow>(&format!(
            r#"
            UPDATE loans SET status = $1, return_date = GREATEST($2, loan_date), updated_at = NOW()
            WHERE loan_id = $3
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(i16::from(LoanStatus::Returned))
        .bind(returned_at)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE books SET available_copies = LEAST(available_copies + 1, total_copies),
                             updated_at = NOW()
            WHERE book_id = $1
            "#,
        )
        .bind(row.book_id())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Loan::try_from(row)
    }
}

/// Limit and duplicate rules, evaluated while the customer row is locked
async fn recheck_customer_rules(
    tx: &mut Transaction<'_, Postgres>,
    loan: &NewLoan,
    max_books: i32,
) -> AppResult<Option<LoanRejection>> {
    let (active, duplicate) = sqlx::query_as::<_, (i64, bool)>(
        r#"
        SELECT COUNT(*),
               COALESCE(BOOL_OR(book_id = $2), FALSE)
        FROM loans
        WHERE customer_id = $1 AND status = $3
        "#,
    )
    .bind(loan.customer_id)
    .bind(loan.book_id)
    .bind(i16::from(LoanStatus::Active))
    .fetch_one(&mut **tx)
    .await?;

    if active >= i64::from(max_books) {
        return Ok(Some(LoanRejection::LoanLimitReached));
    }
    if duplicate {
        return Ok(Some(LoanRejection::DuplicateActiveLoan));
    }
    Ok(None)
}

fn is_retryable(error: &sqlx::Error) -> bool {
    sql_state(error).is_some_and(|state| is_retryable_state(&state))
}

fn is_retryable_state(state: &str) -> bool {
    RETRYABLE_STATES.contains(&state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_are_retried() {
        assert!(is_retryable_state("40001"));
        assert!(is_retryable_state("40P01"));
        assert!(!is_retryable_state(UNIQUE_VIOLATION));
        assert!(!is_retryable(&sqlx::Error::RowNotFound));
    }
}
