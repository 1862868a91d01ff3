//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, borrowings, health, payments};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Rental API",
        version = "1.0.0",
        description = "Book inventory, borrowings and payments REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::replace_book,
        books::update_book,
        books::delete_book,
        // Borrowings
        borrowings::list_borrowings,
        borrowings::create_borrowing,
        borrowings::get_borrowing,
        borrowings::return_borrowing,
        // Payments
        payments::list_payments,
        payments::get_payment,
        payments::payment_success,
        payments::payment_cancel,
        payments::expire_payment,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::enums::CoverType,
            // Borrowings
            crate::models::borrowing::Borrowing,
            crate::models::borrowing::BorrowingDetails,
            crate::models::borrowing::BorrowingCreated,
            crate::models::borrowing::BorrowingReturned,
            crate::models::borrowing::CreateBorrowing,
            // Payments
            crate::models::payment::Payment,
            crate::models::enums::PaymentStatus,
            crate::models::enums::PaymentType,
            payments::PaymentConfirmation,
            payments::CancelResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog and inventory"),
        (name = "borrowings", description = "Borrowing lifecycle"),
        (name = "payments", description = "Rental fees and fines")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
