//! Books repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::BooksRepository;
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookAvailability, CreateBook},
};

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn require(&self, id: i32) -> AppResult<Book> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }
}

#[async_trait]
impl BooksRepository for PgBooksRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn create(&self, book: &CreateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                title, author, isbn, category, description, published_year,
                total_copies, available_copies, is_active, is_available_for_issue,
                created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, TRUE, TRUE, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(book.title.trim())
        .bind(book.author.trim())
        .bind(book.isbn.trim())
        .bind(&book.category)
        .bind(&book.description)
        .bind(book.published_year)
        .bind(book.total_copies)
        .bind(book.created_by)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return AppError::Conflict("Book with this ISBN already exists".to_string());
                }
            }
            AppError::Database(e)
        })?;

        Ok(created)
    }

    async fn set_total_copies(&self, id: i32, total: i32, now: DateTime<Utc>) -> AppResult<Book> {
        // Right-hand sides see the pre-update row, so the delta is applied once
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies + ($2 - total_copies),
                total_copies = $2,
                updated_at = $3
            WHERE id = $1
              AND available_copies + ($2 - total_copies) >= 0
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(total)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(book) => Ok(book),
            None => {
                let book = self.require(id).await?;
                Err(AppError::Validation(format!(
                    "Total copies cannot be lower than the {} copies on loan",
                    book.copies_on_loan()
                )))
            }
        }
    }

    async fn set_availability(
        &self,
        id: i32,
        availability: &BookAvailability,
        now: DateTime<Utc>,
    ) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET is_active = COALESCE($2, is_active),
                is_available_for_issue = COALESCE($3, is_available_for_issue),
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(availability.is_active)
        .bind(availability.is_available_for_issue)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }
}
