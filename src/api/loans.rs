//! Loan management endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{
        book::Availability,
        loan::{CreateLoanRequest, Loan, LoanOutcome, LoanResponse},
    },
    AppState,
};

use super::AuthenticatedUser;

/// Request a new loan
///
/// Rejected requests answer `400` with the reason as plain text and the
/// machine-readable code in the `x-rejection-code` header.
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoanRequest,
    responses(
        (status = 200, description = "Loan created", body = LoanResponse),
        (status = 400, description = "Loan rejected by a business rule", body = String, content_type = "text/plain",
            headers(("x-rejection-code" = String, description = "Machine-readable rejection reason"))),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoanRequest>,
) -> AppResult<Json<LoanResponse>> {
    tracing::debug!(requested_by = %claims.email, "Loan request received");

    match state.services.loans.request_loan(&request).await? {
        LoanOutcome::Approved(loan) => Ok(Json(loan)),
        LoanOutcome::Rejected(rejection) => Err(rejection.into()),
    }
}

/// Copy availability of a book
#[utoipa::path(
    get,
    path = "/loans/availability/{book_id}",
    tag = "loans",
    params(
        ("book_id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Availability of the book", body = Availability),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_availability(
    State(state): State<AppState>,
    Path(book_id): Path<i32>,
) -> AppResult<Json<Availability>> {
    let availability = state.services.loans.get_availability(book_id).await?;
    Ok(Json(availability))
}

/// Get loan details
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(loan))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan closed and copy given back", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Loan is not active", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.return_loan(id).await?;
    tracing::debug!(loan_id = id, returned_by = %claims.email, "Return recorded");
    Ok(Json(loan))
}
