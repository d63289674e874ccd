//! In-memory store implementing every repository trait
//!
//! All records live behind one `RwLock`. Each mutation takes the write lock
//! and runs its checks and writes without awaiting in between, so a
//! cancelled caller can never leave half an operation behind.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{BooksRepository, IssuesRepository, UsersRepository};
use crate::{
    error::{AppError, AppResult},
    models::{
        user::normalize_email, Book, BookAvailability, BookShort, CreateBook, Issue,
        IssueDetails, IssueFilter, IssueStats, IssueStatus, NewIssue, Role, User, UserShort,
    },
};

#[derive(Default)]
struct MemoryState {
    books: BTreeMap<i32, Book>,
    users: BTreeMap<i32, User>,
    issues: BTreeMap<i32, Issue>,
    next_book_id: i32,
    next_user_id: i32,
    next_issue_id: i32,
}

impl MemoryState {
    fn next_id(counter: &mut i32) -> i32 {
        *counter += 1;
        *counter
    }

    fn has_active_issue(&self, book_id: i32, borrower_id: i32) -> bool {
        self.issues.values().any(|issue| {
            issue.book_id == book_id && issue.borrower_id == borrower_id && issue.status.is_active()
        })
    }

    fn details(&self, issue: &Issue) -> AppResult<IssueDetails> {
        let book = self.books.get(&issue.book_id).ok_or_else(|| {
            AppError::Consistency(format!("issue {} references missing book {}", issue.id, issue.book_id))
        })?;
        let user = |id: i32| {
            self.users.get(&id).map(UserShort::from).ok_or_else(|| {
                AppError::Consistency(format!("issue {} references missing user {}", issue.id, id))
            })
        };

        Ok(IssueDetails {
            id: issue.id,
            issue_date: issue.issue_date,
            due_date: issue.due_date,
            returned_date: issue.returned_date,
            status: issue.status,
            book: BookShort::from(book),
            borrower: user(issue.borrower_id)?,
            issuer: user(issue.issued_by)?,
            is_overdue: false,
        })
    }

    fn collect<'a>(&self, issues: impl Iterator<Item = &'a Issue>) -> AppResult<Vec<IssueDetails>> {
        issues.map(|issue| self.details(issue)).collect()
    }
}

/// Shared handle to the in-memory records; clones see the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user; stands in for the account service
    pub async fn insert_user(&self, name: &str, email: &str, role: Role) -> User {
        let mut state = self.state.write().await;
        let id = MemoryState::next_id(&mut state.next_user_id);
        let user = User {
            id,
            name: name.to_string(),
            email: normalize_email(email),
            role,
            created_at: Utc::now(),
        };
        state.users.insert(id, user.clone());
        user
    }

    /// Overwrite a book's counters as-is, bypassing every check.
    /// Only useful to stage inconsistent states in tests.
    pub async fn force_copies(&self, book_id: i32, total: i32, available: i32) {
        let mut state = self.state.write().await;
        if let Some(book) = state.books.get_mut(&book_id) {
            book.total_copies = total;
            book.available_copies = available;
        }
    }

    /// Snapshot of every book
    pub async fn books(&self) -> Vec<Book> {
        self.state.read().await.books.values().cloned().collect()
    }

    /// Snapshot of every issue
    pub async fn issues(&self) -> Vec<Issue> {
        self.state.read().await.issues.values().cloned().collect()
    }
}

#[async_trait]
impl BooksRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.state.read().await.books.get(&id).cloned())
    }

    async fn create(&self, book: &CreateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let isbn = book.isbn.trim();
        if state.books.values().any(|existing| existing.isbn == isbn) {
            return Err(AppError::Conflict("Book with this ISBN already exists".to_string()));
        }

        let id = MemoryState::next_id(&mut state.next_book_id);
        let created = Book {
            id,
            title: book.title.trim().to_string(),
            author: book.author.trim().to_string(),
            isbn: isbn.to_string(),
            category: book.category.clone(),
            description: book.description.clone(),
            published_year: book.published_year,
            total_copies: book.total_copies,
            available_copies: book.total_copies,
            is_active: true,
            is_available_for_issue: true,
            created_by: book.created_by,
            created_at: now,
            updated_at: now,
        };
        state.books.insert(id, created.clone());
        Ok(created)
    }

    async fn set_total_copies(&self, id: i32, total: i32, now: DateTime<Utc>) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let book = state
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let available = book.available_copies + (total - book.total_copies);
        if available < 0 {
            return Err(AppError::Validation(format!(
                "Total copies cannot be lower than the {} copies on loan",
                book.copies_on_loan()
            )));
        }

        book.total_copies = total;
        book.available_copies = available;
        book.updated_at = now;
        Ok(book.clone())
    }

    async fn set_availability(
        &self,
        id: i32,
        availability: &BookAvailability,
        now: DateTime<Utc>,
    ) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let book = state
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        if let Some(is_active) = availability.is_active {
            book.is_active = is_active;
        }
        if let Some(is_available_for_issue) = availability.is_available_for_issue {
            book.is_available_for_issue = is_available_for_issue;
        }
        book.updated_at = now;
        Ok(book.clone())
    }
}

#[async_trait]
impl UsersRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let email = normalize_email(email);
        let state = self.state.read().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }
}

#[async_trait]
impl IssuesRepository for MemoryStore {
    async fn allocate(&self, issue: &NewIssue, now: DateTime<Utc>) -> AppResult<Issue> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&issue.borrower_id) {
            return Err(AppError::BorrowerNotFound(format!("user id {}", issue.borrower_id)));
        }
        if !state.users.contains_key(&issue.issued_by) {
            return Err(AppError::NotFound(format!(
                "Issuing staff member {} not found",
                issue.issued_by
            )));
        }
        if state.has_active_issue(issue.book_id, issue.borrower_id) {
            return Err(AppError::DuplicateActiveLoan);
        }

        let book = state
            .books
            .get_mut(&issue.book_id)
            .filter(|book| book.can_issue())
            .ok_or(AppError::NoCopiesAvailable)?;
        book.available_copies -= 1;
        book.updated_at = now;

        let id = MemoryState::next_id(&mut state.next_issue_id);
        let created = Issue {
            id,
            book_id: issue.book_id,
            borrower_id: issue.borrower_id,
            issued_by: issue.issued_by,
            issue_date: now,
            due_date: issue.due_date,
            returned_date: None,
            status: IssueStatus::Issued,
            created_at: now,
            updated_at: now,
        };
        state.issues.insert(id, created.clone());
        Ok(created)
    }

    async fn return_issue(&self, id: i32, now: DateTime<Utc>) -> AppResult<Issue> {
        let mut state = self.state.write().await;

        let book_id = match state.issues.get(&id) {
            Some(issue) if issue.status.can_transition_to(IssueStatus::Returned) => issue.book_id,
            _ => return Err(AppError::LoanNotActiveOrMissing),
        };

        // Validate the counter before touching anything so a fault changes nothing
        match state.books.get(&book_id) {
            Some(book) if book.available_copies < book.total_copies => {}
            _ => {
                tracing::error!(
                    "Returning issue {} would push book {} above its total copies",
                    id,
                    book_id
                );
                return Err(AppError::Consistency(format!(
                    "book {} has no copy on loan to take back for issue {}",
                    book_id, id
                )));
            }
        }

        if let Some(book) = state.books.get_mut(&book_id) {
            book.available_copies += 1;
            book.updated_at = now;
        }

        let issue = state
            .issues
            .get_mut(&id)
            .ok_or(AppError::LoanNotActiveOrMissing)?;
        issue.status = IssueStatus::Returned;
        issue.returned_date = Some(now);
        issue.updated_at = now;
        Ok(issue.clone())
    }

    async fn extend_due_date(
        &self,
        id: i32,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Issue> {
        let mut state = self.state.write().await;
        let issue = state
            .issues
            .get_mut(&id)
            .filter(|issue| issue.status.is_active())
            .ok_or(AppError::LoanNotActive)?;

        issue.due_date = due_date;
        issue.status = IssueStatus::Issued;
        issue.updated_at = now;
        Ok(issue.clone())
    }

    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut marked = 0;
        for issue in state.issues.values_mut() {
            if issue.status.can_transition_to(IssueStatus::Overdue) && issue.due_date < now {
                issue.status = IssueStatus::Overdue;
                issue.updated_at = now;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn get_details(&self, id: i32) -> AppResult<Option<IssueDetails>> {
        let state = self.state.read().await;
        state.issues.get(&id).map(|issue| state.details(issue)).transpose()
    }

    async fn list(&self, filter: IssueFilter) -> AppResult<Vec<IssueDetails>> {
        let state = self.state.read().await;
        let mut selected: Vec<&Issue> = state
            .issues
            .values()
            .filter(|issue| match filter {
                IssueFilter::All => true,
                IssueFilter::Borrower(user_id) => issue.borrower_id == user_id,
                IssueFilter::Book(book_id) => issue.book_id == book_id,
                IssueFilter::Status(status) => issue.status == status,
            })
            .collect();

        if filter == IssueFilter::Status(IssueStatus::Overdue) {
            selected.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        } else {
            selected.sort_by(|a, b| b.issue_date.cmp(&a.issue_date).then(b.id.cmp(&a.id)));
        }

        state.collect(selected.into_iter())
    }

    async fn search(&self, term: &str) -> AppResult<Vec<IssueDetails>> {
        let needle = term.to_lowercase();
        let status = term.parse::<IssueStatus>().ok();
        let state = self.state.read().await;

        let mut matched = Vec::new();
        for issue in state.issues.values() {
            let details = state.details(issue)?;
            let hit = [
                &details.book.title,
                &details.book.author,
                &details.borrower.name,
                &details.borrower.email,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
                || status == Some(details.status);
            if hit {
                matched.push(details);
            }
        }

        matched.sort_by(|a, b| b.issue_date.cmp(&a.issue_date).then(b.id.cmp(&a.id)));
        Ok(matched)
    }

    async fn stats(&self) -> AppResult<IssueStats> {
        let state = self.state.read().await;
        let mut stats = IssueStats::default();
        for issue in state.issues.values() {
            match issue.status {
                IssueStatus::Issued => stats.issued += 1,
                IssueStatus::Overdue => stats.overdue += 1,
                IssueStatus::Returned => stats.returned += 1,
            }
        }
        Ok(stats)
    }
}
