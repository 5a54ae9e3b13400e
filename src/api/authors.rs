//! Author endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::author::{AuthorQuery, AuthorWithBooks},
    AppState,
};

/// List authors together with their books
#[utoipa::path(
    get,
    path = "/authors/with-books",
    tag = "authors",
    params(AuthorQuery),
    responses(
        (status = 200, description = "Authors and their books", body = Vec<AuthorWithBooks>)
    )
)]
pub async fn list_with_books(
    State(state): State<AppState>,
    Query(query): Query<AuthorQuery>,
) -> AppResult<Json<Vec<AuthorWithBooks>>> {
    let authors = state.services.authors.list_with_books(&query).await?;
    Ok(Json(authors))
}
