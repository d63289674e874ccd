//! Librams Library Management System
//!
//! REST JSON API over a book catalog and its issuance inventory: issuing
//! copies to borrowers, returns, due-date extensions and overdue tracking,
//! with copy counts that stay consistent under concurrent requests.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<services::Services>,
}
