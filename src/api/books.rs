//! Book catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::AppResult,
    models::book::{Book, BookAvailability, CreateBook},
};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookViewQuery {
    /// User looking at the catalog; students only see books open for issue
    pub viewer_id: Option<i32>,
}

/// Set total copies request
#[derive(Deserialize, Validate, ToSchema)]
pub struct SetCopiesRequest {
    #[validate(range(min = 1, message = "A book needs at least one copy"))]
    pub total_copies: i32,
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid book"),
        (status = 409, description = "ISBN already exists")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    book.validate()?;

    let book = state.services.catalog.create_book(book).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Get a book
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID"),
        BookViewQuery
    ),
    responses(
        (status = 200, description = "Book", body = Book),
        (status = 404, description = "Book not found or hidden from the viewer")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(book_id): Path<i32>,
    Query(query): Query<BookViewQuery>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(query.viewer_id, book_id).await?;
    Ok(Json(book))
}

/// Change the number of copies of a book
#[utoipa::path(
    put,
    path = "/books/{id}/copies",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = SetCopiesRequest,
    responses(
        (status = 200, description = "Copies updated", body = Book),
        (status = 400, description = "Fewer copies than currently on loan"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn set_copies(
    State(state): State<crate::AppState>,
    Path(book_id): Path<i32>,
    Json(request): Json<SetCopiesRequest>,
) -> AppResult<Json<Book>> {
    request.validate()?;

    let book = state
        .services
        .issues
        .set_total_copies(book_id, request.total_copies)
        .await?;
    Ok(Json(book))
}

/// Open or close a book for new issues, or soft delete it
#[utoipa::path(
    put,
    path = "/books/{id}/availability",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = BookAvailability,
    responses(
        (status = 200, description = "Flags updated", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn set_availability(
    State(state): State<crate::AppState>,
    Path(book_id): Path<i32>,
    Json(availability): Json<BookAvailability>,
) -> AppResult<Json<Book>> {
    let book = state
        .services
        .catalog
        .set_availability(book_id, availability)
        .await?;
    Ok(Json(book))
}
