//! Author listing service

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::author::{AuthorQuery, AuthorWithBooks},
    repository::Store,
};

#[derive(Clone)]
pub struct AuthorsService {
    store: Arc<dyn Store>,
}

impl AuthorsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Authors with the books they wrote
    pub async fn list_with_books(&self, query: &AuthorQuery) -> AppResult<Vec<AuthorWithBooks>> {
        self.store.list_authors_with_books(query).await
    }
}
