//! Catalog service: book creation, lookup and issue gating

use std::sync::Arc;

use validator::Validate;

use super::clock::Clock;
use crate::{
    error::{AppError, AppResult},
    models::{Book, BookAvailability, CreateBook, Role},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Create a book with every copy available
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        let created = self.repository.books.create(&book, self.clock.now()).await?;
        tracing::info!(
            "Catalog create: book id={} isbn={} with {} copies",
            created.id,
            created.isbn,
            created.total_copies
        );
        Ok(created)
    }

    /// Role of a user; unknown or anonymous viewers are treated as students
    pub async fn find_user_role(&self, user_id: Option<i32>) -> AppResult<Role> {
        let Some(user_id) = user_id else {
            return Ok(Role::Student);
        };
        let user = self.repository.users.get_by_id(user_id).await?;
        Ok(user.map(|u| u.role).unwrap_or_default())
    }

    /// Get a book as seen by `viewer_id`. Students only see books that are
    /// active and open for issue.
    pub async fn get_book(&self, viewer_id: Option<i32>, book_id: i32) -> AppResult<Book> {
        let role = self.find_user_role(viewer_id).await?;
        let book = self
            .repository
            .books
            .get_by_id(book_id)
            .await?
            .filter(|book| {
                role.sees_whole_catalog() || (book.is_active && book.is_available_for_issue)
            })
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
        Ok(book)
    }

    /// Toggle the active / open-for-issue flags. Existing issues are unaffected.
    pub async fn set_availability(
        &self,
        book_id: i32,
        availability: BookAvailability,
    ) -> AppResult<Book> {
        let book = self
            .repository
            .books
            .set_availability(book_id, &availability, self.clock.now())
            .await?;
        tracing::info!(
            "Catalog update: book id={} active={} open_for_issue={}",
            book.id,
            book.is_active,
            book.is_available_for_issue
        );
        Ok(book)
    }
}
