//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, authors, books, customers, health, loans};

/// Registers the JWT bearer scheme referenced by protected endpoints
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Token returned by POST /api/v1/auth/login"))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "CoolLibrary API",
        version = "1.0.0",
        description = "Library Management REST API: books, customers, authors and loans",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::set_available_copies,
        // Customers
        customers::list_customers,
        customers::create_customer,
        customers::delete_customer,
        customers::update_membership_status,
        // Authors
        authors::list_with_books,
        // Loans
        loans::create_loan,
        loans::get_availability,
        loans::get_loan,
        loans::return_loan,
    ),
    components(
        schemas(
            // Auth
            crate::models::user::RegisterRequest,
            crate::models::user::RegisterResponse,
            crate::models::user::LoginRequest,
            crate::models::user::AuthResponse,
            // Books
            crate::models::book::Book,
            crate::models::book::BookSummary,
            crate::models::book::CreateBook,
            crate::models::book::Availability,
            books::SetAvailableCopiesRequest,
            // Customers
            crate::models::customer::Customer,
            crate::models::customer::CustomerSummary,
            crate::models::customer::CreateCustomer,
            crate::models::customer::UpdateMembershipStatus,
            crate::models::customer::MembershipStatus,
            // Authors
            crate::models::author::AuthorWithBooks,
            crate::models::author::AuthorBook,
            // Loans
            crate::models::loan::CreateLoanRequest,
            crate::models::loan::LoanResponse,
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Book catalogue"),
        (name = "customers", description = "Customer management"),
        (name = "authors", description = "Authors and their books"),
        (name = "loans", description = "Loan requests, returns and availability")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
