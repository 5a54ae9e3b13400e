//! Book model and related types

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// ISBN-10 (optional trailing X) or ISBN-13, once separators are removed
static ISBN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d{9}[\dX]|97[89]\d{10})$").expect("valid ISBN pattern"));

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub book_id: i32,
    pub isbn: String,
    pub title: String,
    pub description: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub publisher: Option<String>,
    pub page_count: Option<i32>,
    pub language: String,
    /// Copies not currently on loan
    pub available_copies: i32,
    /// Copies owned by the library
    pub total_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// `0 <= available <= total`
    pub fn has_valid_copy_count(&self) -> bool {
        self.available_copies >= 0 && self.available_copies <= self.total_copies
    }
}

/// Short book representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub book_id: i32,
    pub title: String,
    pub isbn: String,
    pub publisher: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub is_available: bool,
}

impl From<Book> for BookSummary {
    fn from(book: Book) -> Self {
        BookSummary {
            is_available: book.is_available(),
            book_id: book.book_id,
            title: book.title,
            isbn: book.isbn,
            publisher: book.publisher,
            publication_date: book.publication_date,
        }
    }
}

/// Copy availability of a single book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub book_id: i32,
    pub available_copies: i32,
    pub is_available: bool,
}

impl From<&Book> for Availability {
    fn from(book: &Book) -> Self {
        Availability {
            book_id: book.book_id,
            available_copies: book.available_copies,
            is_available: book.is_available(),
        }
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(custom(function = "validate_isbn"))]
    pub isbn: String,
    #[validate(length(min = 1, max = 300, message = "Title must be between 1 and 300 characters"))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description cannot be longer than 2000 characters"))]
    pub description: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    #[validate(length(max = 200, message = "Publisher cannot be longer than 200 characters"))]
    pub publisher: Option<String>,
    #[validate(range(min = 1, message = "Page count must be positive"))]
    pub page_count: Option<i32>,
    /// Defaults to "English"
    #[validate(length(min = 1, max = 50, message = "Language must be between 1 and 50 characters"))]
    pub language: Option<String>,
    #[validate(range(min = 0, message = "Total copies cannot be negative"))]
    pub total_copies: i32,
    /// Defaults to `total_copies`
    #[validate(range(min = 0, message = "Available copies cannot be negative"))]
    pub available_copies: Option<i32>,
}

/// Strip the separators people usually type into an ISBN
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn validate_isbn(isbn: &str) -> Result<(), ValidationError> {
    if ISBN_PATTERN.is_match(&normalize_isbn(isbn)) {
        Ok(())
    } else {
        let mut error = ValidationError::new("isbn");
        error.message = Some("Invalid ISBN".into());
        Err(error)
    }
}
