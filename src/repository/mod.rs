//! Repository layer for database operations
//!
//! Each concern is a trait so the inventory engine runs unchanged against
//! PostgreSQL or the in-memory store.

pub mod books;
pub mod issues;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        Book, BookAvailability, CreateBook, Issue, IssueDetails, IssueFilter, IssueStats,
        NewIssue, User,
    },
};

/// Catalog primitives. Copy counts only move through `set_total_copies`,
/// which keeps `available = total - active issues`.
#[async_trait]
pub trait BooksRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>>;

    /// Insert a book with every copy available. Duplicate ISBN is a `Conflict`.
    async fn create(&self, book: &CreateBook, now: DateTime<Utc>) -> AppResult<Book>;

    /// Change the total, moving `available_copies` by the same delta.
    /// Fails with `Validation` when the total would drop below the copies on loan.
    async fn set_total_copies(&self, id: i32, total: i32, now: DateTime<Utc>) -> AppResult<Book>;

    async fn set_availability(
        &self,
        id: i32,
        availability: &BookAvailability,
        now: DateTime<Utc>,
    ) -> AppResult<Book>;
}

/// Identity lookups consumed by the engine
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<User>>;

    /// Lookup by normalized email
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
}

/// Issue records and the copy counter mutations tied to them.
///
/// Every mutating method is one atomic unit: either all of its effects on
/// `issues` and `books` commit, or none do.
#[async_trait]
pub trait IssuesRepository: Send + Sync {
    /// Borrower check, duplicate check, conditional decrement and insert
    async fn allocate(&self, issue: &NewIssue, now: DateTime<Utc>) -> AppResult<Issue>;

    /// Mark an active issue returned and give its copy back
    async fn return_issue(&self, id: i32, now: DateTime<Utc>) -> AppResult<Issue>;

    /// Move the due date of an active issue and reset it to `issued`
    async fn extend_due_date(
        &self,
        id: i32,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Issue>;

    /// Flip every `issued` issue due before `now` to `overdue`; returns the count
    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64>;

    async fn get_details(&self, id: i32) -> AppResult<Option<IssueDetails>>;

    async fn list(&self, filter: IssueFilter) -> AppResult<Vec<IssueDetails>>;

    /// Case-insensitive match on title, author, borrower name/email or status
    async fn search(&self, term: &str) -> AppResult<Vec<IssueDetails>>;

    async fn stats(&self) -> AppResult<IssueStats>;
}

/// Main repository struct holding one implementation per concern
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BooksRepository>,
    pub users: Arc<dyn UsersRepository>,
    pub issues: Arc<dyn IssuesRepository>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::PgBooksRepository::new(pool.clone())),
            users: Arc::new(users::PgUsersRepository::new(pool.clone())),
            issues: Arc::new(issues::PgIssuesRepository::new(pool)),
        }
    }

    /// Create a repository backed by a shared in-memory store
    pub fn in_memory(store: memory::MemoryStore) -> Self {
        Self {
            books: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            issues: Arc::new(store),
        }
    }
}
