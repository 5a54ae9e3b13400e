//! In-process store used by tests and `memory://` demos
//!
//! All tables live behind a single mutex, so every operation, including the
//! loan commit, observes and mutates a consistent snapshot.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorBook, AuthorQuery, AuthorWithBooks},
        book::{Book, CreateBook},
        customer::{CreateCustomer, Customer, MembershipStatus, DEFAULT_MAX_BOOKS_ALLOWED},
        loan::{Loan, LoanCommit, LoanRejection, LoanStatus, NewLoan},
        user::{NewUser, User},
    },
};

use super::{AuthorStore, BookStore, CatalogStore, CustomerStore, Store, UserStore};

#[derive(Default)]
struct Tables {
    books: BTreeMap<i32, Book>,
    customers: BTreeMap<i32, Customer>,
    authors: BTreeMap<i32, Author>,
    /// (author_id, book_id)
    book_authors: Vec<(i32, i32)>,
    loans: BTreeMap<i32, Loan>,
    users: BTreeMap<i32, User>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn active_loans(&self, customer_id: i32) -> impl Iterator<Item = &Loan> {
        self.loans
            .values()
            .filter(move |l| l.customer_id == customer_id && l.is_active())
    }
}

/// Mutex-guarded tables with the same semantics as the Postgres schema
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with a small catalogue, for local runs without Postgres
    pub async fn with_sample_data() -> AppResult<Self> {
        let store = Self::new();
        let now = Utc::now();

        let dune = store.insert_book(&sample_book("9780441172719", "Dune", 3)).await?;
        let earthsea = store
            .insert_book(&sample_book("9780547773742", "A Wizard of Earthsea", 1))
            .await?;

        let herbert = store.add_author("Frank", "Herbert", Some("American")).await;
        let le_guin = store.add_author("Ursula K.", "Le Guin", Some("American")).await;
        store.link_author(herbert.author_id, dune.book_id).await?;
        store.link_author(le_guin.author_id, earthsea.book_id).await?;

        store
            .insert_customer(
                &CreateCustomer {
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    email: "ada@example.com".to_string(),
                    phone: None,
                    address: None,
                    city: Some("London".to_string()),
                    postal_code: None,
                    max_books_allowed: Some(2),
                },
                now,
            )
            .await?;

        Ok(store)
    }

    /// Make `ping` fail, simulating a lost database
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn add_author(&self, first_name: &str, last_name: &str, nationality: Option<&str>) -> Author {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let author = Author {
            author_id: tables.next_id(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            biography: None,
            birth_date: None,
            nationality: nationality.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        tables.authors.insert(author.author_id, author.clone());
        author
    }

    pub async fn link_author(&self, author_id: i32, book_id: i32) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.authors.contains_key(&author_id) || !tables.books.contains_key(&book_id) {
            return Err(AppError::NotFound("Author or book not found".to_string()));
        }
        if !tables.book_authors.contains(&(author_id, book_id)) {
            tables.book_authors.push((author_id, book_id));
        }
        Ok(())
    }
}

fn sample_book(isbn: &str, title: &str, copies: i32) -> CreateBook {
    CreateBook {
        isbn: isbn.to_string(),
        title: title.to_string(),
        description: None,
        publication_date: None,
        publisher: None,
        page_count: None,
        language: None,
        total_copies: copies,
        available_copies: None,
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_book(&self, book_id: i32) -> AppResult<Option<Book>> {
        Ok(self.tables.lock().await.books.get(&book_id).cloned())
    }

    async fn get_customer(&self, customer_id: i32) -> AppResult<Option<Customer>> {
        Ok(self.tables.lock().await.customers.get(&customer_id).cloned())
    }

    async fn count_active_loans(&self, customer_id: i32) -> AppResult<i64> {
        Ok(self.tables.lock().await.active_loans(customer_id).count() as i64)
    }

    async fn has_active_loan(&self, customer_id: i32, book_id: i32) -> AppResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .active_loans(customer_id)
            .any(|l| l.book_id == book_id))
    }

    async fn create_loan(&self, loan: &NewLoan) -> AppResult<LoanCommit> {
        let mut tables = self.tables.lock().await;

        let Some(customer) = tables.customers.get(&loan.customer_id) else {
            return Ok(LoanCommit::Rejected(LoanRejection::CustomerNotFound));
        };
        let max_books = customer.max_books_allowed;
        let active_member = customer.is_active();

        let available = tables
            .books
            .get(&loan.book_id)
            .map(|b| b.available_copies)
            .unwrap_or(0);
        if available <= 0 {
            return Ok(LoanCommit::Rejected(LoanRejection::BookNotAvailable));
        }
        if !active_member {
            return Ok(LoanCommit::Rejected(LoanRejection::CustomerNotActive));
        }
        if tables.active_loans(loan.customer_id).count() as i64 >= i64::from(max_books) {
            return Ok(LoanCommit::Rejected(LoanRejection::LoanLimitReached));
        }
        if tables
            .active_loans(loan.customer_id)
            .any(|l| l.book_id == loan.book_id)
        {
            return Ok(LoanCommit::Rejected(LoanRejection::DuplicateActiveLoan));
        }

        let now = Utc::now();
        if let Some(book) = tables.books.get_mut(&loan.book_id) {
            book.available_copies -= 1;
            book.updated_at = now;
        }

        let created = Loan {
            loan_id: tables.next_id(),
            customer_id: loan.customer_id,
            book_id: loan.book_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: None,
            status: LoanStatus::Active,
            renewal_count: 0,
            late_fee: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        tables.loans.insert(created.loan_id, created.clone());

        Ok(LoanCommit::Created(created))
    }

    async fn update_available_copies(&self, book_id: i32, available_copies: i32) -> AppResult<Option<Book>> {
        let mut tables = self.tables.lock().await;
        match tables.books.get_mut(&book_id) {
            Some(book) => {
                if available_copies < 0 || available_copies > book.total_copies {
                    return Err(AppError::Validation(
                        "Available copies must be between 0 and total copies".to_string(),
                    ));
                }
                book.available_copies = available_copies;
                book.updated_at = Utc::now();
                Ok(Some(book.clone()))
            }
            None => Ok(None),
        }
    }

    async fn get_loan(&self, loan_id: i32) -> AppResult<Option<Loan>> {
        Ok(self.tables.lock().await.loans.get(&loan_id).cloned())
    }

    async fn return_loan(&self, loan_id: i32, returned_at: DateTime<Utc>) -> AppResult<Loan> {
        let mut tables = self.tables.lock().await;

        let loan = tables
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;
        if !loan.is_active() {
            return Err(AppError::Conflict("Loan is not active".to_string()));
        }
        loan.status = LoanStatus::Returned;
        loan.return_date = Some(returned_at.max(loan.loan_date));
        loan.updated_at = returned_at;
        let returned = loan.clone();

        if let Some(book) = tables.books.get_mut(&returned.book_id) {
            book.available_copies = (book.available_copies + 1).min(book.total_copies);
            book.updated_at = returned_at;
        }

        Ok(returned)
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list_books(&self) -> AppResult<Vec<Book>> {
        let tables = self.tables.lock().await;
        let mut books: Vec<Book> = tables.books.values().cloned().collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.book_id.cmp(&b.book_id)));
        Ok(books)
    }

    async fn isbn_exists(&self, isbn: &str) -> AppResult<bool> {
        Ok(self.tables.lock().await.books.values().any(|b| b.isbn == isbn))
    }

    async fn insert_book(&self, book: &CreateBook) -> AppResult<Book> {
        let mut tables = self.tables.lock().await;
        if tables.books.values().any(|b| b.isbn == book.isbn) {
            return Err(AppError::Conflict(format!(
                "A book with ISBN '{}' already exists",
                book.isbn
            )));
        }

        let now = Utc::now();
        let created = Book {
            book_id: tables.next_id(),
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            description: book.description.clone(),
            publication_date: book.publication_date,
            publisher: book.publisher.clone(),
            page_count: book.page_count,
            language: book.language.clone().unwrap_or_else(|| "English".to_string()),
            available_copies: book.available_copies.unwrap_or(book.total_copies),
            total_copies: book.total_copies,
            created_at: now,
            updated_at: now,
        };
        if !created.has_valid_copy_count() {
            return Err(AppError::Validation(
                "Available copies cannot exceed total copies".to_string(),
            ));
        }
        tables.books.insert(created.book_id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn list_customers(&self) -> AppResult<Vec<Customer>> {
        let tables = self.tables.lock().await;
        let mut customers: Vec<Customer> = tables.customers.values().cloned().collect();
        customers.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.customer_id).cmp(&(&b.last_name, &b.first_name, b.customer_id))
        });
        Ok(customers)
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .customers
            .values()
            .any(|c| c.email.eq_ignore_ascii_case(email)))
    }

    async fn insert_customer(&self, customer: &CreateCustomer, now: DateTime<Utc>) -> AppResult<Customer> {
        let mut tables = self.tables.lock().await;
        if tables
            .customers
            .values()
            .any(|c| c.email.eq_ignore_ascii_case(&customer.email))
        {
            return Err(AppError::Validation(format!(
                "A customer with email '{}' already exists.",
                customer.email
            )));
        }

        let created = Customer {
            customer_id: tables.next_id(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            address: customer.address.clone(),
            city: customer.city.clone(),
            postal_code: customer.postal_code.clone(),
            membership_date: now,
            membership_status: MembershipStatus::Active,
            max_books_allowed: customer.max_books_allowed.unwrap_or(DEFAULT_MAX_BOOKS_ALLOWED),
            created_at: now,
            updated_at: now,
        };
        tables.customers.insert(created.customer_id, created.clone());
        Ok(created)
    }

    async fn delete_customer(&self, customer_id: i32) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.customers.contains_key(&customer_id) {
            return Ok(false);
        }
        if tables.loans.values().any(|l| l.customer_id == customer_id) {
            return Err(AppError::Conflict(format!(
                "Customer with ID {} has loans and cannot be deleted",
                customer_id
            )));
        }
        tables.customers.remove(&customer_id);
        Ok(true)
    }

    async fn update_membership_status(
        &self,
        customer_id: i32,
        status: MembershipStatus,
    ) -> AppResult<Option<Customer>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.customers.get_mut(&customer_id).map(|customer| {
            customer.membership_status = status;
            customer.updated_at = Utc::now();
            customer.clone()
        }))
    }
}

#[async_trait]
impl AuthorStore for MemoryStore {
    async fn list_authors_with_books(&self, query: &AuthorQuery) -> AppResult<Vec<AuthorWithBooks>> {
        let tables = self.tables.lock().await;
        let mut authors: Vec<&Author> = tables.authors.values().filter(|a| query.matches(a)).collect();
        authors.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.author_id).cmp(&(&b.last_name, &b.first_name, b.author_id))
        });

        Ok(authors
            .into_iter()
            .map(|author| {
                let mut books: Vec<AuthorBook> = tables
                    .book_authors
                    .iter()
                    .filter(|(author_id, _)| *author_id == author.author_id)
                    .filter_map(|(_, book_id)| tables.books.get(book_id))
                    .map(|b| AuthorBook {
                        book_id: b.book_id,
                        title: b.title.clone(),
                        isbn: b.isbn.clone(),
                    })
                    .collect();
                books.sort_by(|a, b| a.title.cmp(&b.title).then(a.book_id.cmp(&b.book_id)));
                AuthorWithBooks::new(author.clone(), books)
            })
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .tables
            .lock()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_user(&self, user: &NewUser) -> AppResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(AppError::Validation(
                "User with this email already exists".to_string(),
            ));
        }
        let created = User {
            id: tables.next_id(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            roles: user.roles.clone(),
            created_at: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("Store is not reachable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn customer_request(email: &str, max_books: i32) -> CreateCustomer {
        CreateCustomer {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: email.to_string(),
            phone: None,
            address: None,
            city: None,
            postal_code: None,
            max_books_allowed: Some(max_books),
        }
    }

    #[tokio::test]
    async fn test_commit_takes_a_copy() {
        let store = MemoryStore::new();
        let book = store.insert_book(&sample_book("9780441172719", "Dune", 1)).await.unwrap();
        let customer = store
            .insert_customer(&customer_request("grace@example.com", 3), Utc::now())
            .await
            .unwrap();

        let start = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap();
        let commit = store
            .create_loan(&NewLoan::new(customer.customer_id, book.book_id, start))
            .await
            .unwrap();
        assert!(matches!(commit, LoanCommit::Created(_)));
        assert_eq!(store.get_book(book.book_id).await.unwrap().unwrap().available_copies, 0);

        let again = store
            .create_loan(&NewLoan::new(customer.customer_id, book.book_id, start))
            .await
            .unwrap();
        assert_eq!(again, LoanCommit::Rejected(LoanRejection::BookNotAvailable));
    }

    #[tokio::test]
    async fn test_return_restores_copy_once() {
        let store = MemoryStore::new();
        let book = store.insert_book(&sample_book("9780441172719", "Dune", 2)).await.unwrap();
        let customer = store
            .insert_customer(&customer_request("grace@example.com", 3), Utc::now())
            .await
            .unwrap();
        let LoanCommit::Created(loan) = store
            .create_loan(&NewLoan::new(customer.customer_id, book.book_id, Utc::now()))
            .await
            .unwrap()
        else {
            panic!("loan should be created");
        };

        let returned = store.return_loan(loan.loan_id, Utc::now()).await.unwrap();
        assert_eq!(returned.status, LoanStatus::Returned);
        assert!(returned.return_date.is_some());
        assert_eq!(store.get_book(book.book_id).await.unwrap().unwrap().available_copies, 2);

        let err = store.return_loan(loan.loan_id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.get_book(book.book_id).await.unwrap().unwrap().available_copies, 2);
    }

    #[tokio::test]
    async fn test_customer_with_loans_cannot_be_deleted() {
        let store = MemoryStore::new();
        let book = store.insert_book(&sample_book("9780441172719", "Dune", 2)).await.unwrap();
        let customer = store
            .insert_customer(&customer_request("grace@example.com", 3), Utc::now())
            .await
            .unwrap();
        store
            .create_loan(&NewLoan::new(customer.customer_id, book.book_id, Utc::now()))
            .await
            .unwrap();

        let err = store.delete_customer(customer.customer_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(!store.delete_customer(9999).await.unwrap());
    }

    #[tokio::test]
    async fn test_sample_data_links_authors() {
        let store = MemoryStore::with_sample_data().await.unwrap();
        let authors = store
            .list_authors_with_books(&AuthorQuery { name: Some("herbert".to_string()) })
            .await
            .unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].books[0].title, "Dune");
    }

    #[tokio::test]
    async fn test_author_books_are_ordered_by_title() {
        let store = MemoryStore::new();
        let messiah = store
            .insert_book(&sample_book("9780441172696", "Dune Messiah", 1))
            .await
            .unwrap();
        let children = store
            .insert_book(&sample_book("9780441104024", "Children of Dune", 1))
            .await
            .unwrap();
        let herbert = store.add_author("Frank", "Herbert", None).await;
        store.link_author(herbert.author_id, messiah.book_id).await.unwrap();
        store.link_author(herbert.author_id, children.book_id).await.unwrap();

        let authors = store
            .list_authors_with_books(&AuthorQuery { name: None })
            .await
            .unwrap();
        let titles: Vec<&str> = authors[0].books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["Children of Dune", "Dune Messiah"]);
    }

    #[tokio::test]
    async fn test_inventory_update_returns_stored_book() {
        let store = MemoryStore::new();
        let book = store.insert_book(&sample_book("9780441172719", "Dune", 3)).await.unwrap();

        let updated = store
            .update_available_copies(book.book_id, 1)
            .await
            .unwrap()
            .expect("book exists");
        assert_eq!(updated.available_copies, 1);
        let stored = store.get_book(book.book_id).await.unwrap().unwrap();
        assert_eq!(stored.available_copies, 1);
        assert_eq!(stored.updated_at, updated.updated_at);
        assert!(store.update_available_copies(9999, 1).await.unwrap().is_none());
    }
}
