//! Issues repository for database operations
//!
//! Allocation and return run inside one transaction each. The copy counter
//! only moves through conditional `UPDATE ... WHERE` statements, so the row
//! lock taken by the update serializes concurrent issues of the same book and
//! the condition is evaluated against the latest committed count.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, QueryBuilder};

use super::IssuesRepository;
use crate::{
    error::{AppError, AppResult},
    models::issue::{
        Issue, IssueDetails, IssueDetailsRow, IssueFilter, IssueStats, IssueStatus, NewIssue,
    },
};

/// Partial unique index enforcing one active issue per (book, borrower)
const ACTIVE_LOAN_INDEX: &str = "uq_issues_active_loan";

const DETAILS_SELECT: &str = r#"
    SELECT i.id, i.book_id, i.borrower_id, i.issued_by, i.issue_date, i.due_date,
           i.returned_date, i.status,
           b.title AS book_title, b.author AS book_author, b.isbn AS book_isbn,
           br.name AS borrower_name, br.email AS borrower_email,
           st.name AS issuer_name, st.email AS issuer_email
    FROM issues i
    JOIN books b ON b.id = i.book_id
    JOIN users br ON br.id = i.borrower_id
    JOIN users st ON st.id = i.issued_by
"#;

#[derive(Clone)]
pub struct PgIssuesRepository {
    pool: Pool<Postgres>,
}

impl PgIssuesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Map constraint violations raised while writing issues to domain errors
fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() && db.constraint() == Some(ACTIVE_LOAN_INDEX) {
            return AppError::DuplicateActiveLoan;
        }
        if db.is_check_violation() {
            tracing::error!("Inventory check constraint violated: {}", db.message());
            return AppError::Consistency(db.message().to_string());
        }
    }
    AppError::Database(err)
}

/// Escape LIKE wildcards so the search term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl IssuesRepository for PgIssuesRepository {
    async fn allocate(&self, issue: &NewIssue, now: DateTime<Utc>) -> AppResult<Issue> {
        // Dropping the transaction on any early return rolls it back
        let mut tx = self.pool.begin().await?;

        let borrower_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(issue.borrower_id)
                .fetch_one(&mut *tx)
                .await?;
        if !borrower_exists {
            return Err(AppError::BorrowerNotFound(format!("user id {}", issue.borrower_id)));
        }

        let issuer_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(issue.issued_by)
                .fetch_one(&mut *tx)
                .await?;
        if !issuer_exists {
            return Err(AppError::NotFound(format!(
                "Issuing staff member {} not found",
                issue.issued_by
            )));
        }

        let duplicate: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM issues
                WHERE book_id = $1 AND borrower_id = $2 AND status IN ('issued', 'overdue')
            )
            "#,
        )
        .bind(issue.book_id)
        .bind(issue.borrower_id)
        .fetch_one(&mut *tx)
        .await?;
        if duplicate {
            return Err(AppError::DuplicateActiveLoan);
        }

        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = $2
            WHERE id = $1
              AND available_copies > 0
              AND is_active
              AND is_available_for_issue
            RETURNING available_copies
            "#,
        )
        .bind(issue.book_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_error)?;
        let Some(remaining) = remaining else {
            return Err(AppError::NoCopiesAvailable);
        };

        // A concurrent issue for the same pair surfaces here as a unique violation
        let created = sqlx::query_as::<_, Issue>(
            r#"
            INSERT INTO issues (
                book_id, borrower_id, issued_by, issue_date, due_date, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 'issued', $4, $4)
            RETURNING *
            "#,
        )
        .bind(issue.book_id)
        .bind(issue.borrower_id)
        .bind(issue.issued_by)
        .bind(now)
        .bind(issue.due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;

        tracing::debug!(
            "Book {} now has {} available copies",
            issue.book_id,
            remaining
        );
        Ok(created)
    }

    async fn return_issue(&self, id: i32, now: DateTime<Utc>) -> AppResult<Issue> {
        let mut tx = self.pool.begin().await?;

        let returned = sqlx::query_as::<_, Issue>(
            r#"
            UPDATE issues
            SET status = 'returned', returned_date = $2, updated_at = $2
            WHERE id = $1 AND status IN ('issued', 'overdue')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_error)?
        .ok_or(AppError::LoanNotActiveOrMissing)?;

        let restored: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1, updated_at = $2
            WHERE id = $1 AND available_copies < total_copies
            RETURNING available_copies
            "#,
        )
        .bind(returned.book_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_error)?;

        if restored.is_none() {
            tracing::error!(
                "Returning issue {} would push book {} above its total copies",
                id,
                returned.book_id
            );
            return Err(AppError::Consistency(format!(
                "book {} has no copy on loan to take back for issue {}",
                returned.book_id, id
            )));
        }

        tx.commit().await?;
        Ok(returned)
    }

    async fn extend_due_date(
        &self,
        id: i32,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Issue> {
        sqlx::query_as::<_, Issue>(
            r#"
            UPDATE issues
            SET due_date = $2, status = 'issued', updated_at = $3
            WHERE id = $1 AND status IN ('issued', 'overdue')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(due_date)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::LoanNotActive)
    }

    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE issues
            SET status = 'overdue', updated_at = $1
            WHERE status = 'issued' AND due_date < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_details(&self, id: i32) -> AppResult<Option<IssueDetails>> {
        let mut query = QueryBuilder::<Postgres>::new(DETAILS_SELECT);
        query.push(" WHERE i.id = ").push_bind(id);

        let row = query
            .build_query_as::<IssueDetailsRow>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(IssueDetails::from))
    }

    async fn list(&self, filter: IssueFilter) -> AppResult<Vec<IssueDetails>> {
        let mut query = QueryBuilder::<Postgres>::new(DETAILS_SELECT);

        match filter {
            IssueFilter::All => {}
            IssueFilter::Borrower(user_id) => {
                query.push(" WHERE i.borrower_id = ").push_bind(user_id);
            }
            IssueFilter::Book(book_id) => {
                query.push(" WHERE i.book_id = ").push_bind(book_id);
            }
            IssueFilter::Status(status) => {
                query.push(" WHERE i.status = ").push_bind(status);
            }
        }

        if filter == IssueFilter::Status(IssueStatus::Overdue) {
            query.push(" ORDER BY i.due_date ASC, i.id ASC");
        } else {
            query.push(" ORDER BY i.issue_date DESC, i.id DESC");
        }

        let rows = query
            .build_query_as::<IssueDetailsRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(IssueDetails::from).collect())
    }

    async fn search(&self, term: &str) -> AppResult<Vec<IssueDetails>> {
        let pattern = format!("%{}%", escape_like(term));
        let status = term.parse::<IssueStatus>().ok();

        let mut query = QueryBuilder::<Postgres>::new(DETAILS_SELECT);
        query.push(" WHERE (");
        {
            let mut conditions = query.separated(" OR ");
            for column in ["b.title", "b.author", "br.name", "br.email"] {
                conditions.push(format!("{} ILIKE ", column));
                conditions.push_bind_unseparated(pattern.clone());
            }
            if let Some(status) = status {
                conditions.push("i.status = ");
                conditions.push_bind_unseparated(status);
            }
        }
        query.push(") ORDER BY i.issue_date DESC, i.id DESC");

        let rows = query
            .build_query_as::<IssueDetailsRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(IssueDetails::from).collect())
    }

    async fn stats(&self) -> AppResult<IssueStats> {
        let stats = sqlx::query_as::<_, IssueStats>(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'issued') AS issued,
                   COUNT(*) FILTER (WHERE status = 'overdue') AS overdue,
                   COUNT(*) FILTER (WHERE status = 'returned') AS returned
            FROM issues
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
