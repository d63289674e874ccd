//! Book (catalog record) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Full book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub total_copies: i32,
    /// Copies not currently on loan; only the inventory engine changes it
    pub available_copies: i32,
    pub is_active: bool,
    pub is_available_for_issue: bool,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Whether a new issue may take a copy of this book right now
    pub fn can_issue(&self) -> bool {
        self.is_active && self.is_available_for_issue && self.available_copies > 0
    }

    /// Copies currently held by borrowers
    pub fn copies_on_loan(&self) -> i32 {
        self.total_copies - self.available_copies
    }

    /// Verify `0 <= available_copies <= total_copies`
    pub fn check_copy_invariant(&self) -> AppResult<()> {
        if self.available_copies < 0 || self.available_copies > self.total_copies {
            return Err(AppError::Consistency(format!(
                "book {} has {} available of {} copies",
                self.id, self.available_copies, self.total_copies
            )));
        }
        Ok(())
    }
}

/// Short book representation embedded in issue details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
}

impl From<&Book> for BookShort {
    fn from(book: &Book) -> Self {
        BookShort {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
        }
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    pub category: String,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    #[validate(range(min = 1, message = "A book needs at least one copy"))]
    pub total_copies: i32,
    pub created_by: Option<i32>,
}

/// Issue gating flags; `None` leaves the flag unchanged
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BookAvailability {
    pub is_active: Option<bool>,
    pub is_available_for_issue: Option<bool>,
}
