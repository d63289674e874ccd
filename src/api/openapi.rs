//! OpenAPI documentation

use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::api::{books, health, issues};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Librams API",
        version = "1.0.0",
        description = "Library Management System REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::create_book,
        books::get_book,
        books::set_copies,
        books::set_availability,
        // Issues
        issues::create_issue,
        issues::return_issue,
        issues::extend_issue,
        issues::list_issues,
        issues::list_overdue,
        issues::search_issues,
        issues::get_stats,
        issues::get_issue,
        issues::get_book_issues,
        issues::get_user_issues,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::CreateBook,
            crate::models::book::BookAvailability,
            books::SetCopiesRequest,
            // Users
            crate::models::user::Role,
            crate::models::user::UserShort,
            // Issues
            crate::models::issue::Issue,
            crate::models::issue::IssueStatus,
            crate::models::issue::IssueDetails,
            crate::models::issue::IssueStats,
            issues::IssueBookRequest,
            issues::ExtendDueDateRequest,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "issues", description = "Issuing, returning and extending loans")
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document as JSON
pub fn create_openapi_router() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
