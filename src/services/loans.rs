//! Loan request processing
//!
//! A request is checked against an ordered list of rules, each evaluated over
//! a read-only snapshot of the book, the customer and the customer's active
//! loans. The first failing rule decides the rejection. When every rule
//! passes, the store commits the loan and the copy decrement as one unit.

use std::sync::Arc;

use mockable::Clock;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Availability, Book},
        customer::Customer,
        loan::{CreateLoanRequest, Loan, LoanCommit, LoanOutcome, LoanRejection, LoanResponse, NewLoan},
    },
    repository::CatalogStore,
};

/// Everything the rules look at, read before any decision is made
#[derive(Debug, Clone)]
pub struct LoanSnapshot {
    pub book: Option<Book>,
    pub customer: Option<Customer>,
    pub active_loans: i64,
    pub has_active_loan_for_book: bool,
}

type Rule = fn(&LoanSnapshot) -> Result<(), LoanRejection>;

/// Evaluation order is significant: the first failure wins
const RULES: [Rule; 6] = [
    book_exists,
    customer_exists,
    book_available,
    customer_active,
    under_loan_limit,
    no_duplicate_loan,
];

fn book_exists(s: &LoanSnapshot) -> Result<(), LoanRejection> {
    s.book.as_ref().map(|_| ()).ok_or(LoanRejection::BookNotFound)
}

fn customer_exists(s: &LoanSnapshot) -> Result<(), LoanRejection> {
    s.customer.as_ref().map(|_| ()).ok_or(LoanRejection::CustomerNotFound)
}

fn book_available(s: &LoanSnapshot) -> Result<(), LoanRejection> {
    match &s.book {
        Some(book) if book.is_available() => Ok(()),
        _ => Err(LoanRejection::BookNotAvailable),
    }
}

fn customer_active(s: &LoanSnapshot) -> Result<(), LoanRejection> {
    match &s.customer {
        Some(customer) if customer.is_active() => Ok(()),
        _ => Err(LoanRejection::CustomerNotActive),
    }
}

fn under_loan_limit(s: &LoanSnapshot) -> Result<(), LoanRejection> {
    match &s.customer {
        Some(customer) if s.active_loans < i64::from(customer.max_books_allowed) => Ok(()),
        _ => Err(LoanRejection::LoanLimitReached),
    }
}

fn no_duplicate_loan(s: &LoanSnapshot) -> Result<(), LoanRejection> {
    if s.has_active_loan_for_book {
        Err(LoanRejection::DuplicateActiveLoan)
    } else {
        Ok(())
    }
}

/// First rule the snapshot fails, if any
pub fn evaluate_rules(snapshot: &LoanSnapshot) -> Option<LoanRejection> {
    RULES.iter().find_map(|rule| rule(snapshot).err())
}

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
}

impl LoansService {
    pub fn new(store: Arc<dyn CatalogStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Decide a loan request and, when approved, commit it
    pub async fn request_loan(&self, request: &CreateLoanRequest) -> AppResult<LoanOutcome> {
        let snapshot = self.snapshot(request.customer_id, request.book_id).await?;
        if let Some(rejection) = evaluate_rules(&snapshot) {
            tracing::info!(
                customer_id = request.customer_id,
                book_id = request.book_id,
                code = rejection.code(),
                "Loan request rejected"
            );
            return Ok(LoanOutcome::Rejected(rejection));
        }

        // Loans always start now; clients cannot backdate them
        let new_loan = NewLoan::new(request.customer_id, request.book_id, self.clock.utc());
        match self.store.create_loan(&new_loan).await? {
            LoanCommit::Created(loan) => {
                tracing::info!(
                    loan_id = loan.loan_id,
                    customer_id = loan.customer_id,
                    book_id = loan.book_id,
                    due_date = %loan.due_date,
                    "Loan approved"
                );
                Ok(LoanOutcome::Approved(LoanResponse::from(&loan)))
            }
            LoanCommit::Rejected(rejection) => {
                // Another request changed the data between the snapshot and the commit
                tracing::warn!(
                    customer_id = request.customer_id,
                    book_id = request.book_id,
                    code = rejection.code(),
                    "Loan request rejected at commit"
                );
                Ok(LoanOutcome::Rejected(rejection))
            }
        }
    }

    async fn snapshot(&self, customer_id: i32, book_id: i32) -> AppResult<LoanSnapshot> {
        let (book, customer, active_loans, has_active_loan_for_book) = tokio::try_join!(
            self.store.get_book(book_id),
            self.store.get_customer(customer_id),
            self.store.count_active_loans(customer_id),
            self.store.has_active_loan(customer_id, book_id),
        )?;

        Ok(LoanSnapshot {
            book,
            customer,
            active_loans,
            has_active_loan_for_book,
        })
    }

    /// Copy availability of a book
    pub async fn get_availability(&self, book_id: i32) -> AppResult<Availability> {
        let book = self
            .store
            .get_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        Ok(Availability::from(&book))
    }

    /// Get loan by ID
    pub async fn get_loan(&self, loan_id: i32) -> AppResult<Loan> {
        self.store
            .get_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    /// Close an Active loan and give the copy back
    pub async fn return_loan(&self, loan_id: i32) -> AppResult<Loan> {
        let loan = self.store.return_loan(loan_id, self.clock.utc()).await?;
        tracing::info!(loan_id, book_id = loan.book_id, "Loan returned");
        Ok(loan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            customer::MembershipStatus,
            loan::{LoanStatus, LOAN_PERIOD_DAYS},
        },
        repository::MockCatalogStore,
    };
    use chrono::{DateTime, Duration, Local, TimeZone, Utc};
    use rust_decimal::Decimal;

    struct FixtureClock(DateTime<Utc>);

    impl Clock for FixtureClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap()
    }

    fn book(available: i32) -> Book {
        Book {
            book_id: 10,
            isbn: "9780441172719".to_string(),
            title: "Dune".to_string(),
            description: None,
            publication_date: None,
            publisher: None,
            page_count: None,
            language: "English".to_string(),
            available_copies: available,
            total_copies: 3,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn customer(status: MembershipStatus, max_books: i32) -> Customer {
        Customer {
            customer_id: 20,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            address: None,
            city: None,
            postal_code: None,
            membership_date: now(),
            membership_status: status,
            max_books_allowed: max_books,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn snapshot() -> LoanSnapshot {
        LoanSnapshot {
            book: Some(book(1)),
            customer: Some(customer(MembershipStatus::Active, 2)),
            active_loans: 0,
            has_active_loan_for_book: false,
        }
    }

    fn request() -> CreateLoanRequest {
        CreateLoanRequest {
            customer_id: 20,
            book_id: 10,
        }
    }

    fn mock_reads(store: &mut MockCatalogStore, snapshot: LoanSnapshot) {
        let LoanSnapshot {
            book,
            customer,
            active_loans,
            has_active_loan_for_book,
        } = snapshot;
        store.expect_get_book().returning(move |_| Ok(book.clone()));
        store.expect_get_customer().returning(move |_| Ok(customer.clone()));
        store.expect_count_active_loans().returning(move |_| Ok(active_loans));
        store
            .expect_has_active_loan()
            .returning(move |_, _| Ok(has_active_loan_for_book));
    }

    fn service(store: MockCatalogStore) -> LoansService {
        LoansService::new(Arc::new(store), Arc::new(FixtureClock(now())))
    }

    #[test]
    fn test_rules_pass_for_eligible_request() {
        assert_eq!(evaluate_rules(&snapshot()), None);
    }

    #[test]
    fn test_missing_book_wins_over_everything() {
        let s = LoanSnapshot {
            book: None,
            customer: None,
            active_loans: 9,
            has_active_loan_for_book: true,
        };
        assert_eq!(evaluate_rules(&s), Some(LoanRejection::BookNotFound));
    }

    #[test]
    fn test_rule_order() {
        let mut s = snapshot();
        s.customer = None;
        s.book = Some(book(0));
        assert_eq!(evaluate_rules(&s), Some(LoanRejection::CustomerNotFound));

        let mut s = snapshot();
        s.book = Some(book(0));
        s.customer = Some(customer(MembershipStatus::Suspended, 2));
        assert_eq!(evaluate_rules(&s), Some(LoanRejection::BookNotAvailable));

        let mut s = snapshot();
        s.customer = Some(customer(MembershipStatus::Expired, 2));
        s.active_loans = 2;
        assert_eq!(evaluate_rules(&s), Some(LoanRejection::CustomerNotActive));

        let mut s = snapshot();
        s.active_loans = 2;
        s.has_active_loan_for_book = true;
        assert_eq!(evaluate_rules(&s), Some(LoanRejection::LoanLimitReached));

        let mut s = snapshot();
        s.active_loans = 1;
        s.has_active_loan_for_book = true;
        assert_eq!(evaluate_rules(&s), Some(LoanRejection::DuplicateActiveLoan));
    }

    #[tokio::test]
    async fn test_rejection_writes_nothing() {
        let mut store = MockCatalogStore::new();
        let mut s = snapshot();
        s.book = Some(book(0));
        mock_reads(&mut store, s);
        store.expect_create_loan().never();
        store.expect_update_available_copies().never();

        let outcome = service(store).request_loan(&request()).await.unwrap();
        assert_eq!(outcome, LoanOutcome::Rejected(LoanRejection::BookNotAvailable));
    }

    #[tokio::test]
    async fn test_approved_loan_is_due_in_fourteen_days() {
        let mut store = MockCatalogStore::new();
        mock_reads(&mut store, snapshot());
        store
            .expect_create_loan()
            .times(1)
            .withf(|loan| loan.loan_date == now() && loan.customer_id == 20 && loan.book_id == 10)
            .returning(|loan| {
                Ok(LoanCommit::Created(Loan {
                    loan_id: 1,
                    customer_id: loan.customer_id,
                    book_id: loan.book_id,
                    loan_date: loan.loan_date,
                    due_date: loan.due_date,
                    return_date: None,
                    status: LoanStatus::Active,
                    renewal_count: 0,
                    late_fee: Decimal::ZERO,
                    created_at: loan.loan_date,
                    updated_at: loan.loan_date,
                }))
            });

        let LoanOutcome::Approved(response) = service(store).request_loan(&request()).await.unwrap()
        else {
            panic!("loan should be approved");
        };
        assert_eq!(response.loan_date, now());
        assert_eq!(response.due_date - response.loan_date, Duration::days(LOAN_PERIOD_DAYS));
        assert_eq!(response.status, "Active");
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let mut store = MockCatalogStore::new();
        store
            .expect_get_book()
            .returning(|_| Err(AppError::Internal("connection reset".to_string())));
        store.expect_get_customer().returning(|_| Ok(None));
        store.expect_count_active_loans().returning(|_| Ok(0));
        store.expect_has_active_loan().returning(|_, _| Ok(false));
        store.expect_create_loan().never();

        let err = service(store).request_loan(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_availability() {
        let mut store = MockCatalogStore::new();
        store.expect_get_book().returning(|id| {
            Ok((id == 10).then(|| book(0)))
        });
        let service = service(store);

        let availability = service.get_availability(10).await.unwrap();
        assert_eq!(availability.available_copies, 0);
        assert!(!availability.is_available);

        let err = service.get_availability(11).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_return_uses_clock() {
        let mut store = MockCatalogStore::new();
        store
            .expect_return_loan()
            .withf(|id, at| *id == 5 && *at == now())
            .returning(|_, _| Err(AppError::Conflict("Loan is not active".to_string())));

        let err = service(store).return_loan(5).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
