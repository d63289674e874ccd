//! Issuance inventory engine
//!
//! Sole writer of copy counters and issue status. Every operation validates
//! its input before touching the store, then runs the store call under the
//! retry and deadline policy from [`InventoryConfig`].

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::clock::Clock;
use crate::{
    config::InventoryConfig,
    error::{AppError, AppResult},
    models::{Book, Issue, IssueDetails, IssueFilter, IssueStats, IssueStatus, NewIssue},
    repository::Repository,
};

#[derive(Clone)]
pub struct IssuesService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    policy: InventoryConfig,
}

fn ensure_id(id: i32, what: &str) -> AppResult<()> {
    if id <= 0 {
        return Err(AppError::Validation(format!("Invalid {} id {}", what, id)));
    }
    Ok(())
}

fn ensure_future(due_date: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<()> {
    if due_date <= now {
        return Err(AppError::InvalidDueDate(format!(
            "{} is not in the future",
            due_date.to_rfc3339()
        )));
    }
    Ok(())
}

impl IssuesService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, policy: InventoryConfig) -> Self {
        Self {
            repository,
            clock,
            policy,
        }
    }

    /// Run one store operation, retrying transient failures with exponential
    /// backoff. Conflicts and validation errors pass through untouched.
    /// Exhausted retries and the deadline both surface as `Unavailable`.
    async fn run<T, F, Fut>(&self, operation: &'static str, attempt_once: F) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let attempts = async {
            let mut retries = 0u32;
            loop {
                match attempt_once().await {
                    Err(err) if err.is_transient() => {
                        if retries >= self.policy.max_retries {
                            return Err(AppError::Unavailable(format!(
                                "{} failed after {} attempts: {}",
                                operation,
                                retries + 1,
                                err
                            )));
                        }
                        retries += 1;
                        let delay = self.policy.backoff(retries);
                        tracing::warn!(
                            "{} hit a transient store failure ({}), retry {}/{} in {:?}",
                            operation,
                            err,
                            retries,
                            self.policy.max_retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    result => return result,
                }
            }
        };

        // Dropping the pending attempt aborts its transaction
        let deadline = self.policy.transaction_timeout();
        match tokio::time::timeout(deadline, attempts).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Unavailable(format!(
                "{} did not complete within {:?}",
                operation, deadline
            ))),
        }
    }

    fn flag_overdue(&self, issues: Vec<IssueDetails>) -> Vec<IssueDetails> {
        let now = self.clock.now();
        issues
            .into_iter()
            .map(|issue| issue.with_overdue_flag(now))
            .collect()
    }

    /// Issue one copy of a book to a borrower
    pub async fn allocate(&self, request: NewIssue) -> AppResult<Issue> {
        ensure_id(request.book_id, "book")?;
        ensure_id(request.borrower_id, "borrower")?;
        ensure_id(request.issued_by, "issuer")?;
        let now = self.clock.now();
        ensure_future(request.due_date, now)?;

        let request = &request;
        let issue = self
            .run("issue book", move || self.repository.issues.allocate(request, now))
            .await?;

        tracing::info!(
            "Issued book {} to user {} (issue {}, due {})",
            issue.book_id,
            issue.borrower_id,
            issue.id,
            issue.due_date
        );
        Ok(issue)
    }

    /// Resolve the borrower by email, then allocate
    pub async fn issue_to_email(
        &self,
        book_id: i32,
        borrower_email: &str,
        issued_by: i32,
        due_date: DateTime<Utc>,
    ) -> AppResult<Issue> {
        ensure_id(book_id, "book")?;
        ensure_id(issued_by, "issuer")?;
        ensure_future(due_date, self.clock.now())?;

        let borrower = self
            .run("find borrower", move || {
                self.repository.users.find_by_email(borrower_email)
            })
            .await?
            .ok_or_else(|| {
                tracing::debug!("No user with email {}", borrower_email);
                AppError::BorrowerNotFound(borrower_email.to_string())
            })?;

        self.allocate(NewIssue {
            book_id,
            borrower_id: borrower.id,
            issued_by,
            due_date,
        })
        .await
    }

    /// Take back the copy held by an active issue
    pub async fn return_issue(&self, issue_id: i32) -> AppResult<Issue> {
        ensure_id(issue_id, "issue")?;
        let now = self.clock.now();

        let issue = self
            .run("return issue", move || {
                self.repository.issues.return_issue(issue_id, now)
            })
            .await?;

        tracing::info!(
            "Issue {} returned, one copy of book {} back on the shelf",
            issue.id,
            issue.book_id
        );
        Ok(issue)
    }

    /// Push back the due date of an active issue, clearing any overdue marker
    pub async fn extend_due_date(&self, issue_id: i32, due_date: DateTime<Utc>) -> AppResult<Issue> {
        ensure_id(issue_id, "issue")?;
        let now = self.clock.now();
        ensure_future(due_date, now)?;

        let issue = self
            .run("extend issue", move || {
                self.repository.issues.extend_due_date(issue_id, due_date, now)
            })
            .await?;

        tracing::info!("Issue {} extended to {}", issue.id, issue.due_date);
        Ok(issue)
    }

    /// Change a book's total copies without breaking
    /// `available = total - active issues`
    pub async fn set_total_copies(&self, book_id: i32, total: i32) -> AppResult<Book> {
        ensure_id(book_id, "book")?;
        if total < 1 {
            return Err(AppError::Validation("A book needs at least one copy".to_string()));
        }
        let now = self.clock.now();

        let book = self
            .run("set total copies", move || {
                self.repository.books.set_total_copies(book_id, total, now)
            })
            .await?;
        book.check_copy_invariant()?;

        tracing::info!(
            "Book {} now has {} copies ({} available)",
            book.id,
            book.total_copies,
            book.available_copies
        );
        Ok(book)
    }

    /// Mark every issued loan past its due date as overdue
    pub async fn sweep_overdue(&self) -> AppResult<u64> {
        let now = self.clock.now();
        let marked = self
            .run("sweep overdue", move || self.repository.issues.mark_overdue(now))
            .await?;

        if marked > 0 {
            tracing::info!("Marked {} issues overdue", marked);
        }
        Ok(marked)
    }

    /// Overdue issues, oldest due date first. Sweeps before reading.
    pub async fn list_overdue(&self) -> AppResult<Vec<IssueDetails>> {
        self.sweep_overdue().await?;

        let issues = self
            .run("list overdue", move || {
                self.repository
                    .issues
                    .list(IssueFilter::Status(IssueStatus::Overdue))
            })
            .await?;

        tracing::debug!("Overdue issues found: {}", issues.len());
        Ok(self.flag_overdue(issues))
    }

    pub async fn list_all(&self) -> AppResult<Vec<IssueDetails>> {
        let issues = self
            .run("list issues", move || self.repository.issues.list(IssueFilter::All))
            .await?;
        Ok(self.flag_overdue(issues))
    }

    /// Every issue of a borrower, newest first
    pub async fn list_by_borrower(&self, borrower_id: i32) -> AppResult<Vec<IssueDetails>> {
        ensure_id(borrower_id, "borrower")?;

        // Verify user exists
        self.run("find borrower", move || {
            self.repository.users.get_by_id(borrower_id)
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", borrower_id)))?;

        let issues = self
            .run("list borrower issues", move || {
                self.repository.issues.list(IssueFilter::Borrower(borrower_id))
            })
            .await?;
        Ok(self.flag_overdue(issues))
    }

    /// Issue history of a book, newest first
    pub async fn list_by_book(&self, book_id: i32) -> AppResult<Vec<IssueDetails>> {
        ensure_id(book_id, "book")?;

        self.run("find book", move || self.repository.books.get_by_id(book_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        let issues = self
            .run("list book issues", move || {
                self.repository.issues.list(IssueFilter::Book(book_id))
            })
            .await?;
        Ok(self.flag_overdue(issues))
    }

    pub async fn get_issue(&self, issue_id: i32) -> AppResult<IssueDetails> {
        ensure_id(issue_id, "issue")?;

        let issue = self
            .run("get issue", move || self.repository.issues.get_details(issue_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Issue with id {} not found", issue_id)))?;
        Ok(issue.with_overdue_flag(self.clock.now()))
    }

    /// Free-text search over book title/author, borrower name/email and status
    pub async fn search(&self, term: &str) -> AppResult<Vec<IssueDetails>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(AppError::Validation("Search term is required".to_string()));
        }

        let issues = self
            .run("search issues", move || self.repository.issues.search(term))
            .await?;

        tracing::debug!("Search '{}' matched {} issues", term, issues.len());
        Ok(self.flag_overdue(issues))
    }

    /// Cheap round trip to the store for readiness probes
    pub async fn ping(&self) -> AppResult<()> {
        self.run("ping", move || self.repository.issues.stats())
            .await
            .map(|_| ())
    }

    /// Issue counts per status, after sweeping
    pub async fn stats(&self) -> AppResult<IssueStats> {
        self.sweep_overdue().await?;
        self.run("issue stats", move || self.repository.issues.stats())
            .await
    }
}
