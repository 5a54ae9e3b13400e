//! Book catalogue service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{normalize_isbn, Book, BookSummary, CreateBook},
    repository::Store,
};

#[derive(Clone)]
pub struct BooksService {
    store: Arc<dyn Store>,
}

impl BooksService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// List all books
    pub async fn list_books(&self) -> AppResult<Vec<BookSummary>> {
        let books = self.store.list_books().await?;
        Ok(books.into_iter().map(BookSummary::from).collect())
    }

    /// Get book by ID
    pub async fn get_book(&self, book_id: i32) -> AppResult<Book> {
        self.store
            .get_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with ID {} not found", book_id)))
    }

    /// Create a new book
    pub async fn create_book(&self, mut book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        book.isbn = normalize_isbn(&book.isbn);

        let available = book.available_copies.unwrap_or(book.total_copies);
        if available > book.total_copies {
            return Err(AppError::Validation(
                "Available copies cannot exceed total copies".to_string(),
            ));
        }

        if self.store.isbn_exists(&book.isbn).await? {
            return Err(AppError::Conflict(format!(
                "A book with ISBN '{}' already exists",
                book.isbn
            )));
        }

        let created = self.store.insert_book(&book).await?;
        tracing::info!(book_id = created.book_id, isbn = %created.isbn, "Book created");
        Ok(created)
    }

    /// Correct the available copy counter after an inventory check
    pub async fn set_available_copies(&self, book_id: i32, available_copies: i32) -> AppResult<Book> {
        let book = self.get_book(book_id).await?;
        if available_copies < 0 || available_copies > book.total_copies {
            return Err(AppError::Validation(format!(
                "Available copies must be between 0 and {}",
                book.total_copies
            )));
        }

        let updated = self
            .store
            .update_available_copies(book_id, available_copies)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with ID {} not found", book_id)))?;
        tracing::info!(book_id, available_copies, "Available copies adjusted");

        Ok(updated)
    }
}
