//! API handlers for CoolLibrary REST endpoints

pub mod auth;
pub mod authors;
pub mod books;
pub mod customers;
pub mod health;
pub mod loans;
pub mod openapi;

use std::time::Duration;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{delete, get, post, put},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::Authentication("Missing or invalid authorization header".to_string())
                })?;

        let claims = state.services.auth.validate_token(bearer.token())?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut auth_routes: Router<AppState> = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    // Throttle credential guessing per client IP
    if let Some(limit) = &state.config.server.rate_limit {
        match GovernorConfigBuilder::default()
            .per_second(limit.per_second)
            .burst_size(limit.burst_size)
            .finish()
        {
            Some(config) => {
                // The layer needs a config that lives as long as the server
                auth_routes = auth_routes.layer(GovernorLayer {
                    config: Box::leak(Box::new(config)),
                });
            }
            None => tracing::warn!("Invalid rate limit settings, authentication routes are not throttled"),
        }
    }

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/:id", get(books::get_book))
        .route("/books/:id/available-copies", put(books::set_available_copies))
        // Customers
        .route("/customers", get(customers::list_customers).post(customers::create_customer))
        .route("/customers/:id", delete(customers::delete_customer))
        .route(
            "/customers/:id/membership-status",
            put(customers::update_membership_status),
        )
        // Authors
        .route("/authors/with-books", get(authors::list_with_books))
        // Loans
        .route("/loans", post(loans::create_loan))
        .route("/loans/availability/:book_id", get(loans::get_availability))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        .merge(auth_routes)
        .with_state(state.clone());

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.server.request_timeout_secs,
        )))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
