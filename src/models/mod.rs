//! Data models for Librams

pub mod book;
pub mod issue;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookAvailability, BookShort, CreateBook};
pub use issue::{Issue, IssueDetails, IssueFilter, IssueStats, IssueStatus, NewIssue};
pub use user::{Role, User, UserShort};
