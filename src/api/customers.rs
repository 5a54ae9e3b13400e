//! Customer management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::customer::{CreateCustomer, Customer, CustomerSummary, UpdateMembershipStatus},
    AppState,
};

use super::AuthenticatedUser;

/// List all customers
#[utoipa::path(
    get,
    path = "/customers",
    tag = "customers",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All customers", body = Vec<CustomerSummary>),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_customers(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<CustomerSummary>>> {
    let customers = state.services.customers.list_customers().await?;
    Ok(Json(customers))
}

/// Register a new customer
#[utoipa::path(
    post,
    path = "/customers",
    tag = "customers",
    security(("bearer_auth" = [])),
    request_body = CreateCustomer,
    responses(
        (status = 201, description = "Customer created", body = Customer),
        (status = 400, description = "Invalid data or email already used", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_customer(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Json(customer): Json<CreateCustomer>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    let created = state.services.customers.create_customer(customer).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Delete a customer
#[utoipa::path(
    delete,
    path = "/customers/{id}",
    tag = "customers",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Customer ID")
    ),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Customer not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Customer still has loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.customers.delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change a customer's membership status
#[utoipa::path(
    put,
    path = "/customers/{id}/membership-status",
    tag = "customers",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Customer ID")
    ),
    request_body = UpdateMembershipStatus,
    responses(
        (status = 200, description = "Updated customer", body = Customer),
        (status = 404, description = "Customer not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_membership_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateMembershipStatus>,
) -> AppResult<Json<Customer>> {
    tracing::debug!(customer_id = id, changed_by = %claims.email, "Membership status change");
    let customer = state
        .services
        .customers
        .update_membership_status(id, request.membership_status)
        .await?;
    Ok(Json(customer))
}
