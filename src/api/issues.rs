//! Issue (loan) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::AppResult,
    models::issue::{Issue, IssueDetails, IssueStats},
};

/// Issue book request
#[derive(Deserialize, Validate, ToSchema)]
pub struct IssueBookRequest {
    /// Book ID
    #[validate(range(min = 1))]
    pub book_id: i32,
    /// Email of the borrowing user
    #[validate(email)]
    pub borrower_email: String,
    /// ID of the staff member handing out the copy
    #[validate(range(min = 1))]
    pub issued_by: i32,
    /// Due date (ISO 8601, must be in the future)
    pub due_date: DateTime<Utc>,
}

/// Extend due date request
#[derive(Deserialize, ToSchema)]
pub struct ExtendDueDateRequest {
    /// New due date (ISO 8601, must be in the future)
    pub due_date: DateTime<Utc>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Matched against book title/author, borrower name/email and status
    pub term: String,
}

/// Issue a copy of a book
#[utoipa::path(
    post,
    path = "/issues",
    tag = "issues",
    request_body = IssueBookRequest,
    responses(
        (status = 201, description = "Copy issued", body = Issue),
        (status = 400, description = "Invalid request or due date"),
        (status = 404, description = "Borrower not found"),
        (status = 409, description = "No copies available or borrower already holds this book"),
        (status = 503, description = "Store busy, try again")
    )
)]
pub async fn create_issue(
    State(state): State<crate::AppState>,
    Json(request): Json<IssueBookRequest>,
) -> AppResult<(StatusCode, Json<Issue>)> {
    request.validate()?;

    let issue = state
        .services
        .issues
        .issue_to_email(
            request.book_id,
            &request.borrower_email,
            request.issued_by,
            request.due_date,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(issue)))
}

/// Return an issued copy
#[utoipa::path(
    post,
    path = "/issues/{id}/return",
    tag = "issues",
    params(
        ("id" = i32, Path, description = "Issue ID")
    ),
    responses(
        (status = 200, description = "Copy returned", body = Issue),
        (status = 409, description = "Issue not found or already returned")
    )
)]
pub async fn return_issue(
    State(state): State<crate::AppState>,
    Path(issue_id): Path<i32>,
) -> AppResult<Json<Issue>> {
    let issue = state.services.issues.return_issue(issue_id).await?;
    Ok(Json(issue))
}

/// Extend the due date of an active issue
#[utoipa::path(
    put,
    path = "/issues/{id}/extend",
    tag = "issues",
    params(
        ("id" = i32, Path, description = "Issue ID")
    ),
    request_body = ExtendDueDateRequest,
    responses(
        (status = 200, description = "Due date extended", body = Issue),
        (status = 400, description = "Due date not in the future"),
        (status = 409, description = "Issue is not active")
    )
)]
pub async fn extend_issue(
    State(state): State<crate::AppState>,
    Path(issue_id): Path<i32>,
    Json(request): Json<ExtendDueDateRequest>,
) -> AppResult<Json<Issue>> {
    let issue = state
        .services
        .issues
        .extend_due_date(issue_id, request.due_date)
        .await?;
    Ok(Json(issue))
}

/// List every issue, newest first
#[utoipa::path(
    get,
    path = "/issues",
    tag = "issues",
    responses(
        (status = 200, description = "All issues", body = Vec<IssueDetails>)
    )
)]
pub async fn list_issues(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<IssueDetails>>> {
    let issues = state.services.issues.list_all().await?;
    Ok(Json(issues))
}

/// List overdue issues (marks newly overdue issues first)
#[utoipa::path(
    get,
    path = "/issues/overdue",
    tag = "issues",
    responses(
        (status = 200, description = "Overdue issues, oldest due date first", body = Vec<IssueDetails>)
    )
)]
pub async fn list_overdue(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<IssueDetails>>> {
    let issues = state.services.issues.list_overdue().await?;
    Ok(Json(issues))
}

/// Search issues
#[utoipa::path(
    get,
    path = "/issues/search",
    tag = "issues",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching issues", body = Vec<IssueDetails>),
        (status = 400, description = "Empty search term")
    )
)]
pub async fn search_issues(
    State(state): State<crate::AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<IssueDetails>>> {
    let issues = state.services.issues.search(&query.term).await?;
    Ok(Json(issues))
}

/// Issue counts per status
#[utoipa::path(
    get,
    path = "/issues/stats",
    tag = "issues",
    responses(
        (status = 200, description = "Issue counts", body = IssueStats)
    )
)]
pub async fn get_stats(State(state): State<crate::AppState>) -> AppResult<Json<IssueStats>> {
    let stats = state.services.issues.stats().await?;
    Ok(Json(stats))
}

/// Get issue details
#[utoipa::path(
    get,
    path = "/issues/{id}",
    tag = "issues",
    params(
        ("id" = i32, Path, description = "Issue ID")
    ),
    responses(
        (status = 200, description = "Issue details", body = IssueDetails),
        (status = 404, description = "Issue not found")
    )
)]
pub async fn get_issue(
    State(state): State<crate::AppState>,
    Path(issue_id): Path<i32>,
) -> AppResult<Json<IssueDetails>> {
    let issue = state.services.issues.get_issue(issue_id).await?;
    Ok(Json(issue))
}

/// Issue history of a book
#[utoipa::path(
    get,
    path = "/books/{id}/issues",
    tag = "issues",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Issues of the book, newest first", body = Vec<IssueDetails>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book_issues(
    State(state): State<crate::AppState>,
    Path(book_id): Path<i32>,
) -> AppResult<Json<Vec<IssueDetails>>> {
    let issues = state.services.issues.list_by_book(book_id).await?;
    Ok(Json(issues))
}

/// Issues of a borrower
#[utoipa::path(
    get,
    path = "/users/{id}/issues",
    tag = "issues",
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Issues of the user, newest first", body = Vec<IssueDetails>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_issues(
    State(state): State<crate::AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<IssueDetails>>> {
    let issues = state.services.issues.list_by_borrower(user_id).await?;
    Ok(Json(issues))
}
