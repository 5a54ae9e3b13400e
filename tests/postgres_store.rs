//! Loan commit tests against a real Postgres database
//!
//! Point `DATABASE_URL` at a scratch database, then run
//! `cargo test --test postgres_store -- --ignored`.

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;

use cool_library_server::{
    models::{
        book::CreateBook,
        customer::{CreateCustomer, MembershipStatus},
        loan::{LoanCommit, LoanRejection, NewLoan},
    },
    repository::{BookStore, CatalogStore, CustomerStore, Repository},
};

async fn repository() -> Repository {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(12)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    Repository::new(pool)
}

/// Suffix keeping ISBNs and emails unique across runs
fn unique() -> u128 {
    uuid::Uuid::new_v4().as_u128() % 10_000_000_000
}

async fn add_book(repo: &Repository, copies: i32) -> i32 {
    repo.insert_book(&CreateBook {
        isbn: format!("978{:010}", unique()),
        title: "Dune".to_string(),
        description: None,
        publication_date: None,
        publisher: None,
        page_count: None,
        language: None,
        total_copies: copies,
        available_copies: Some(copies),
    })
    .await
    .unwrap()
    .book_id
}

async fn add_customer(repo: &Repository, max_books: i32) -> i32 {
    repo.insert_customer(
        &CreateCustomer {
            first_name: "Test".to_string(),
            last_name: "Reader".to_string(),
            email: format!("reader-{}@example.com", unique()),
            phone: None,
            address: None,
            city: None,
            postal_code: None,
            max_books_allowed: Some(max_books),
        },
        Utc::now(),
    )
    .await
    .unwrap()
    .customer_id
}

async fn available_copies(repo: &Repository, book_id: i32) -> i32 {
    repo.get_book(book_id).await.unwrap().unwrap().available_copies
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Needs DATABASE_URL
async fn test_only_one_commit_takes_the_last_copy() {
    let repo = repository().await;
    let book = add_book(&repo, 1).await;
    let mut customers = Vec::new();
    for _ in 0..10 {
        customers.push(add_customer(&repo, 5).await);
    }

    let loans: Vec<NewLoan> = customers
        .iter()
        .map(|c| NewLoan::new(*c, book, Utc::now()))
        .collect();
    let commits = futures::future::join_all(loans.iter().map(|l| repo.create_loan(l)))
    .await;

    let created = commits
        .iter()
        .filter(|c| matches!(c, Ok(LoanCommit::Created(_))))
        .count();
    assert_eq!(created, 1);
    for commit in commits.iter().filter(|c| !matches!(c, Ok(LoanCommit::Created(_)))) {
        assert!(matches!(
            commit,
            Ok(LoanCommit::Rejected(LoanRejection::BookNotAvailable))
        ));
    }
    assert_eq!(available_copies(&repo, book).await, 0);
}

#[tokio::test]
#[ignore]
async fn test_inactive_customer_rolls_back_the_decrement() {
    let repo = repository().await;
    let book = add_book(&repo, 2).await;
    let customer = add_customer(&repo, 5).await;
    repo.update_membership_status(customer, MembershipStatus::Suspended)
        .await
        .unwrap();

    let commit = repo
        .create_loan(&NewLoan::new(customer, book, Utc::now()))
        .await
        .unwrap();
    assert_eq!(commit, LoanCommit::Rejected(LoanRejection::CustomerNotActive));
    assert_eq!(available_copies(&repo, book).await, 2);
}

#[tokio::test]
#[ignore]
async fn test_limit_and_duplicate_are_rechecked_under_lock() {
    let repo = repository().await;
    let first = add_book(&repo, 2).await;
    let second = add_book(&repo, 2).await;
    let customer = add_customer(&repo, 1).await;

    let commit = repo
        .create_loan(&NewLoan::new(customer, first, Utc::now()))
        .await
        .unwrap();
    assert!(matches!(commit, LoanCommit::Created(_)));

    let over_limit = repo
        .create_loan(&NewLoan::new(customer, second, Utc::now()))
        .await
        .unwrap();
    assert_eq!(over_limit, LoanCommit::Rejected(LoanRejection::LoanLimitReached));
    assert_eq!(available_copies(&repo, second).await, 2);

    let roomy = add_customer(&repo, 5).await;
    repo.create_loan(&NewLoan::new(roomy, second, Utc::now()))
        .await
        .unwrap();
    let duplicate = repo
        .create_loan(&NewLoan::new(roomy, second, Utc::now()))
        .await
        .unwrap();
    assert_eq!(duplicate, LoanCommit::Rejected(LoanRejection::DuplicateActiveLoan));
    assert_eq!(available_copies(&repo, second).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_second_active_loan_row_violates_unique_index() {
    let repo = repository().await;
    let book = add_book(&repo, 2).await;
    let customer = add_customer(&repo, 5).await;
    repo.create_loan(&NewLoan::new(customer, book, Utc::now()))
        .await
        .unwrap();

    let loan = NewLoan::new(customer, book, Utc::now());
    let err = sqlx::query(
        "INSERT INTO loans (customer_id, book_id, loan_date, due_date, status) VALUES ($1, $2, $3, $4, 1)",
    )
    .bind(loan.customer_id)
    .bind(loan.book_id)
    .bind(loan.loan_date)
    .bind(loan.due_date)
    .execute(&repo.pool)
    .await
    .unwrap_err();

    let code = err.as_database_error().and_then(|e| e.code()).map(|c| c.into_owned());
    assert_eq!(code.as_deref(), Some("23505"));
}

#[tokio::test]
#[ignore]
async fn test_return_gives_the_copy_back() {
    let repo = repository().await;
    let book = add_book(&repo, 1).await;
    let customer = add_customer(&repo, 5).await;
    let LoanCommit::Created(loan) = repo
        .create_loan(&NewLoan::new(customer, book, Utc::now()))
        .await
        .unwrap()
    else {
        panic!("loan should be created");
    };
    assert_eq!(available_copies(&repo, book).await, 0);

    repo.return_loan(loan.loan_id, Utc::now()).await.unwrap();
    assert_eq!(available_copies(&repo, book).await, 1);
    assert!(repo.return_loan(loan.loan_id, Utc::now()).await.is_err());
}
