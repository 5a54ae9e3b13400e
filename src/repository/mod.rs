//! Repository layer: store traits and their Postgres and in-memory implementations

pub mod authors;
pub mod books;
pub mod customers;
pub mod loans;
pub mod memory;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        author::{AuthorQuery, AuthorWithBooks},
        book::{Book, CreateBook},
        customer::{CreateCustomer, Customer, MembershipStatus},
        loan::{Loan, LoanCommit, NewLoan},
        user::{NewUser, User},
    },
};

pub use memory::MemoryStore;

/// Lookups and writes used by the loan request processor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_book(&self, book_id: i32) -> AppResult<Option<Book>>;

    async fn get_customer(&self, customer_id: i32) -> AppResult<Option<Customer>>;

    /// Number of loans with status Active held by the customer
    async fn count_active_loans(&self, customer_id: i32) -> AppResult<i64>;

    async fn has_active_loan(&self, customer_id: i32, book_id: i32) -> AppResult<bool>;

    /// Insert the loan and decrement the book's available copies as one unit.
    ///
    /// The limit, duplicate and availability rules are re-checked while the
    /// rows are locked, so a request that lost a race comes back as
    /// [`LoanCommit::Rejected`] and nothing is written.
    async fn create_loan(&self, loan: &NewLoan) -> AppResult<LoanCommit>;

    /// Overwrite the available copy counter and return the updated book, `None` when unknown
    async fn update_available_copies(&self, book_id: i32, available_copies: i32) -> AppResult<Option<Book>>;

    async fn get_loan(&self, loan_id: i32) -> AppResult<Option<Loan>>;

    /// Mark an Active loan as Returned and give the copy back, as one unit
    async fn return_loan(&self, loan_id: i32, returned_at: DateTime<Utc>) -> AppResult<Loan>;
}

#[async_trait]
pub trait BookStore: Send + Sync {
    async fn list_books(&self) -> AppResult<Vec<Book>>;

    async fn isbn_exists(&self, isbn: &str) -> AppResult<bool>;

    /// `book.isbn` is expected to be normalized already
    async fn insert_book(&self, book: &CreateBook) -> AppResult<Book>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn list_customers(&self) -> AppResult<Vec<Customer>>;

    async fn email_exists(&self, email: &str) -> AppResult<bool>;

    async fn insert_customer(&self, customer: &CreateCustomer, now: DateTime<Utc>) -> AppResult<Customer>;

    /// Returns false when the customer is unknown
    async fn delete_customer(&self, customer_id: i32) -> AppResult<bool>;

    async fn update_membership_status(
        &self,
        customer_id: i32,
        status: MembershipStatus,
    ) -> AppResult<Option<Customer>>;
}

#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn list_authors_with_books(&self, query: &AuthorQuery) -> AppResult<Vec<AuthorWithBooks>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn insert_user(&self, user: &NewUser) -> AppResult<User>;
}

/// Everything the server needs from persistence
#[async_trait]
pub trait Store: CatalogStore + BookStore + CustomerStore + AuthorStore + UserStore {
    /// Cheap round-trip used by the readiness probe
    async fn ping(&self) -> AppResult<()>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub customers: customers::CustomersRepository,
    pub authors: authors::AuthorsRepository,
    pub loans: loans::LoansRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            customers: customers::CustomersRepository::new(pool.clone()),
            authors: authors::AuthorsRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl CatalogStore for Repository {
    async fn get_book(&self, book_id: i32) -> AppResult<Option<Book>> {
        self.books.get_by_id(book_id).await
    }

    async fn get_customer(&self, customer_id: i32) -> AppResult<Option<Customer>> {
        self.customers.get_by_id(customer_id).await
    }

    async fn count_active_loans(&self, customer_id: i32) -> AppResult<i64> {
        self.loans.count_active_for_customer(customer_id).await
    }

    async fn has_active_loan(&self, customer_id: i32, book_id: i32) -> AppResult<bool> {
        self.loans.has_active_for_customer_and_book(customer_id, book_id).await
    }

    async fn create_loan(&self, loan: &NewLoan) -> AppResult<LoanCommit> {
        self.loans.create(loan).await
    }

    async fn update_available_copies(&self, book_id: i32, available_copies: i32) -> AppResult<Option<Book>> {
        self.books.update_available_copies(book_id, available_copies).await
    }

    async fn get_loan(&self, loan_id: i32) -> AppResult<Option<Loan>> {
        self.loans.get_by_id(loan_id).await
    }

    async fn return_loan(&self, loan_id: i32, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        self.loans.mark_returned(loan_id, returned_at).await
    }
}

#[async_trait]
impl BookStore for Repository {
    async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.books.list().await
    }

    async fn isbn_exists(&self, isbn: &str) -> AppResult<bool> {
        self.books.isbn_exists(isbn).await
    }

    async fn insert_book(&self, book: &CreateBook) -> AppResult<Book> {
        self.books.create(book).await
    }
}

#[async_trait]
impl CustomerStore for Repository {
    async fn list_customers(&self) -> AppResult<Vec<Customer>> {
        self.customers.list().await
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        self.customers.email_exists(email).await
    }

    async fn insert_customer(&self, customer: &CreateCustomer, now: DateTime<Utc>) -> AppResult<Customer> {
        self.customers.create(customer, now).await
    }

    async fn delete_customer(&self, customer_id: i32) -> AppResult<bool> {
        self.customers.delete(customer_id).await
    }

    async fn update_membership_status(
        &self,
        customer_id: i32,
        status: MembershipStatus,
    ) -> AppResult<Option<Customer>> {
        self.customers.update_membership_status(customer_id, status).await
    }
}

#[async_trait]
impl AuthorStore for Repository {
    async fn list_authors_with_books(&self, query: &AuthorQuery) -> AppResult<Vec<AuthorWithBooks>> {
        self.authors.list_with_books(query).await
    }
}

#[async_trait]
impl UserStore for Repository {
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.users.get_by_email(email).await
    }

    async fn insert_user(&self, user: &NewUser) -> AppResult<User> {
        self.users.create(user).await
    }
}

#[async_trait]
impl Store for Repository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// SQLSTATE of a unique constraint violation
pub(crate) const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE of a foreign key violation
pub(crate) const FOREIGN_KEY_VIOLATION: &str = "23503";

/// SQLSTATE code of a database error, if any
pub(crate) fn sql_state(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}
