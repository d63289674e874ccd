//! API handlers for Librams REST endpoints
//!
//! Callers are authenticated upstream; handlers take resolved ids.

pub mod books;
pub mod health;
pub mod issues;
pub mod openapi;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", post(books::create_book))
        .route("/books/:id", get(books::get_book))
        .route("/books/:id/copies", put(books::set_copies))
        .route("/books/:id/availability", put(books::set_availability))
        .route("/books/:id/issues", get(issues::get_book_issues))
        // Users
        .route("/users/:id/issues", get(issues::get_user_issues))
        // Issues
        .route("/issues", get(issues::list_issues).post(issues::create_issue))
        .route("/issues/overdue", get(issues::list_overdue))
        .route("/issues/search", get(issues::search_issues))
        .route("/issues/stats", get(issues::get_stats))
        .route("/issues/:id", get(issues::get_issue))
        .route("/issues/:id/return", post(issues::return_issue))
        .route("/issues/:id/extend", put(issues::extend_issue))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
