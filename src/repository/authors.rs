//! Authors repository for database operations

use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::author::{Author, AuthorBook, AuthorQuery, AuthorWithBooks},
};

/// Book row joined with the author it belongs to
#[derive(sqlx::FromRow)]
struct AuthorBookRow {
    author_id: i32,
    book_id: i32,
    title: String,
    isbn: String,
}

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List authors with their books, optionally filtered by name
    pub async fn list_with_books(&self, query: &AuthorQuery) -> AppResult<Vec<AuthorWithBooks>> {
        let pattern = query
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| format!("%{}%", n));

        let authors = sqlx::query_as::<_, Author>(
            r#"
            SELECT author_id, first_name, last_name, biography, birth_date, nationality,
                   created_at, updated_at
            FROM authors
            WHERE $1::text IS NULL
               OR first_name ILIKE $1
               OR last_name ILIKE $1
               OR (first_name || ' ' || last_name) ILIKE $1
            ORDER BY last_name, first_name, author_id
            "#,
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        if authors.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = authors.iter().map(|a| a.author_id).collect();
        let rows = sqlx::query_as::<_, AuthorBookRow>(
            r#"
            SELECT ba.author_id, b.book_id, b.title, b.isbn
            FROM book_authors ba
            JOIN books b ON b.book_id = ba.book_id
            WHERE ba.author_id = ANY($1)
            ORDER BY ba.author_id, b.title, b.book_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut books: HashMap<i32, Vec<AuthorBook>> = HashMap::new();
        for row in rows {
            books.entry(row.author_id).or_default().push(AuthorBook {
                book_id: row.book_id,
                title: row.title,
                isbn: row.isbn,
            });
        }

        Ok(authors
            .into_iter()
            .map(|author| {
                let author_books = books.remove(&author.author_id).unwrap_or_default();
                AuthorWithBooks::new(author, author_books)
            })
            .collect())
    }
}
