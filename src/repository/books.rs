//! Books repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook},
};

use super::{sql_state, UNIQUE_VIOLATION};

const BOOK_COLUMNS: &str = r#"
    book_id, isbn, title, description, publication_date, publisher, page_count,
    language, available_copies, total_copies, created_at, updated_at
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE book_id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    /// List all books ordered by title
    pub async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books ORDER BY title, book_id",
            BOOK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    pub async fn isbn_exists(&self, isbn: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)",
        )
        .bind(isbn)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Create a new book
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let language = book.language.clone().unwrap_or_else(|| "English".to_string());
        let available = book.available_copies.unwrap_or(book.total_copies);

        sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (isbn, title, description, publication_date, publisher,
                               page_count, language, available_copies, total_copies)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.description)
        .bind(book.publication_date)
        .bind(&book.publisher)
        .bind(book.page_count)
        .bind(language)
        .bind(available)
        .bind(book.total_copies)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match sql_state(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => {
                AppError::Conflict(format!("A book with ISBN '{}' already exists", book.isbn))
            }
            _ => AppError::Database(e),
        })
    }

    /// Set the available copy counter, bounded by the table's check constraints
    pub async fn update_available_copies(&self, id: i32, available_copies: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "UPDATE books SET available_copies = $1, updated_at = NOW() WHERE book_id = $2 RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(available_copies)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }
}
