//! Author model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Full author model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Author {
    pub author_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub biography: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub nationality: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Author {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Book nested under an author
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorBook {
    pub book_id: i32,
    pub title: String,
    pub isbn: String,
}

/// Author with the books they wrote, ordered by title
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorWithBooks {
    pub author_id: i32,
    pub full_name: String,
    pub biography: Option<String>,
    pub nationality: Option<String>,
    pub books: Vec<AuthorBook>,
}

impl AuthorWithBooks {
    pub fn new(author: Author, books: Vec<AuthorBook>) -> Self {
        AuthorWithBooks {
            full_name: author.full_name(),
            author_id: author.author_id,
            biography: author.biography,
            nationality: author.nationality,
            books,
        }
    }
}

/// Author query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct AuthorQuery {
    /// Matches first name, last name or full name
    pub name: Option<String>,
}

impl AuthorQuery {
    /// Case-insensitive match used by the in-memory store
    pub fn matches(&self, author: &Author) -> bool {
        match self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            None => true,
            Some(name) => {
                let name = name.to_lowercase();
                author.first_name.to_lowercase().contains(&name)
                    || author.last_name.to_lowercase().contains(&name)
                    || author.full_name().to_lowercase().contains(&name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> Author {
        let now = Utc::now();
        Author {
            author_id: 7,
            first_name: "Ursula".to_string(),
            last_name: "Le Guin".to_string(),
            biography: None,
            birth_date: None,
            nationality: Some("American".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_name_filter() {
        let query = AuthorQuery { name: Some("ursula le".to_string()) };
        assert!(query.matches(&author()));

        let query = AuthorQuery { name: Some("tolkien".to_string()) };
        assert!(!query.matches(&author()));

        assert!(AuthorQuery::default().matches(&author()));
    }

    #[test]
    fn test_with_books_uses_full_name() {
        let dto = AuthorWithBooks::new(author(), Vec::new());
        assert_eq!(dto.full_name, "Ursula Le Guin");
        assert!(dto.books.is_empty());
    }
}
