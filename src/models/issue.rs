//! Issue (loan of one copy) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::BookShort;
use super::user::UserShort;

/// Issue lifecycle status, stored as the `issue_status` enum.
///
/// `Issued` and `Overdue` are both active: the borrower still holds the copy.
/// `Returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "issue_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Issued,
    Overdue,
    Returned,
}

impl IssueStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, IssueStatus::Issued | IssueStatus::Overdue)
    }

    /// Allowed lifecycle transitions:
    /// issued -> overdue (sweep), overdue -> issued (extend),
    /// issued|overdue -> returned (return).
    pub fn can_transition_to(&self, next: IssueStatus) -> bool {
        matches!(
            (self, next),
            (IssueStatus::Issued, IssueStatus::Overdue)
                | (IssueStatus::Overdue, IssueStatus::Issued)
                | (IssueStatus::Issued, IssueStatus::Returned)
                | (IssueStatus::Overdue, IssueStatus::Returned)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Issued => "issued",
            IssueStatus::Overdue => "overdue",
            IssueStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IssueStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "issued" => Ok(IssueStatus::Issued),
            "overdue" => Ok(IssueStatus::Overdue),
            "returned" => Ok(IssueStatus::Returned),
            _ => Err(()),
        }
    }
}

/// Issue model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Issue {
    pub id: i32,
    pub book_id: i32,
    pub borrower_id: i32,
    pub issued_by: i32,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_date: Option<DateTime<Utc>>,
    pub status: IssueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Allocation request handed to the inventory engine
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub book_id: i32,
    pub borrower_id: i32,
    pub issued_by: i32,
    pub due_date: DateTime<Utc>,
}

/// Issue with book, borrower and issuer for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueDetails {
    pub id: i32,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_date: Option<DateTime<Utc>>,
    pub status: IssueStatus,
    pub book: BookShort,
    pub borrower: UserShort,
    pub issuer: UserShort,
    pub is_overdue: bool,
}

/// Flat row produced by the issue detail joins
#[derive(Debug, FromRow)]
pub struct IssueDetailsRow {
    id: i32,
    book_id: i32,
    borrower_id: i32,
    issued_by: i32,
    issue_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    returned_date: Option<DateTime<Utc>>,
    status: IssueStatus,
    book_title: String,
    book_author: String,
    book_isbn: String,
    borrower_name: String,
    borrower_email: String,
    issuer_name: String,
    issuer_email: String,
}

impl From<IssueDetailsRow> for IssueDetails {
    fn from(row: IssueDetailsRow) -> Self {
        IssueDetails {
            id: row.id,
            issue_date: row.issue_date,
            due_date: row.due_date,
            returned_date: row.returned_date,
            status: row.status,
            book: BookShort {
                id: row.book_id,
                title: row.book_title,
                author: row.book_author,
                isbn: row.book_isbn,
            },
            borrower: UserShort {
                id: row.borrower_id,
                name: row.borrower_name,
                email: row.borrower_email,
            },
            issuer: UserShort {
                id: row.issued_by,
                name: row.issuer_name,
                email: row.issuer_email,
            },
            is_overdue: false,
        }
    }
}

impl IssueDetails {
    /// Recompute `is_overdue` against the caller's clock
    pub fn with_overdue_flag(mut self, now: DateTime<Utc>) -> Self {
        self.is_overdue = self.status.is_active() && self.due_date < now;
        self
    }
}

/// Selection for issue listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueFilter {
    All,
    Borrower(i32),
    Book(i32),
    Status(IssueStatus),
}

/// Issue counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct IssueStats {
    pub issued: i64,
    pub overdue: i64,
    pub returned: i64,
}
