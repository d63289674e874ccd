//! Inventory engine against a live PostgreSQL database
//!
//! Run with: DATABASE_URL=postgres://... cargo test --test integration postgres_store -- --ignored --test-threads=1

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use librams_server::{
    config::InventoryConfig,
    error::AppError,
    models::{CreateBook, IssueStatus, NewIssue},
    repository::Repository,
    services::{Services, SystemClock},
};

async fn setup() -> (PgPool, Services) {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    sqlx::query("TRUNCATE issues, books, users RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to reset tables");

    let policy = InventoryConfig {
        max_retries: 5,
        retry_backoff_ms: 5,
        transaction_timeout_ms: 10_000,
    };
    let services = Services::new(Repository::new(pool.clone()), policy, Arc::new(SystemClock));
    (pool, services)
}

async fn insert_user(pool: &PgPool, name: &str, role: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO users (name, email, role) VALUES ($1, $2, $3::user_role) RETURNING id",
    )
    .bind(name)
    .bind(format!("{}@pg.test", name.to_lowercase()))
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("Failed to insert user")
}

async fn create_book(services: &Services, isbn: &str, copies: i32) -> i32 {
    services
        .catalog
        .create_book(CreateBook {
            title: "Foundation".into(),
            author: "Isaac Asimov".into(),
            isbn: isbn.into(),
            category: "Fiction".into(),
            description: None,
            published_year: Some(1951),
            total_copies: copies,
            created_by: None,
        })
        .await
        .expect("Failed to create book")
        .id
}

#[tokio::test]
#[ignore]
async fn test_pg_issue_return_round_trip() {
    let (pool, services) = setup().await;
    let staff = insert_user(&pool, "Hari", "staff").await;
    let student = insert_user(&pool, "Gaal", "student").await;
    let book_id = create_book(&services, "pg-1", 2).await;

    let issue = services
        .issues
        .issue_to_email(book_id, "GAAL@pg.test", staff, Utc::now() + Duration::days(7))
        .await
        .expect("Failed to issue");
    assert_eq!(issue.borrower_id, student);

    let duplicate = services
        .issues
        .allocate(NewIssue {
            book_id,
            borrower_id: student,
            issued_by: staff,
            due_date: Utc::now() + Duration::days(7),
        })
        .await;
    assert!(matches!(duplicate, Err(AppError::DuplicateActiveLoan)));

    let returned = services.issues.return_issue(issue.id).await.unwrap();
    assert_eq!(returned.status, IssueStatus::Returned);

    let again = services.issues.return_issue(issue.id).await;
    assert!(matches!(again, Err(AppError::LoanNotActiveOrMissing)));

    let available: i32 = sqlx::query_scalar("SELECT available_copies FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(available, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_pg_concurrent_issues_of_last_copy() {
    let (pool, services) = setup().await;
    let staff = insert_user(&pool, "Salvor", "staff").await;
    let book_id = create_book(&services, "pg-2", 1).await;

    let mut handles = Vec::new();
    for n in 0..10 {
        let borrower = insert_user(&pool, &format!("Reader{}", n), "student").await;
        let services = services.clone();
        handles.push(tokio::spawn(async move {
            services
                .issues
                .allocate(NewIssue {
                    book_id,
                    borrower_id: borrower,
                    issued_by: staff,
                    due_date: Utc::now() + Duration::days(7),
                })
                .await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(AppError::NoCopiesAvailable) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(granted, 1);

    let (available, active): (i32, i64) = sqlx::query_as(
        "SELECT b.available_copies, \
                (SELECT COUNT(*) FROM issues i WHERE i.book_id = b.id AND i.status <> 'returned') \
         FROM books b WHERE b.id = $1",
    )
    .bind(book_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(available, 0);
    assert_eq!(active, 1);
}

#[tokio::test]
#[ignore]
async fn test_pg_sweep_and_extend() {
    let (pool, services) = setup().await;
    let staff = insert_user(&pool, "Mallow", "staff").await;
    let student = insert_user(&pool, "Bayta", "student").await;
    let book_id = create_book(&services, "pg-3", 1).await;

    // Stage an issue that fell due yesterday
    let issue_id: i32 = sqlx::query_scalar(
        "WITH taken AS (UPDATE books SET available_copies = available_copies - 1 WHERE id = $1) \
         INSERT INTO issues (book_id, borrower_id, issued_by, issue_date, due_date) \
         VALUES ($1, $2, $3, NOW() - INTERVAL '8 days', NOW() - INTERVAL '1 day') RETURNING id",
    )
    .bind(book_id)
    .bind(student)
    .bind(staff)
    .fetch_one(&pool)
    .await
    .unwrap();

    let overdue = services.issues.list_overdue().await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, issue_id);
    assert!(overdue[0].is_overdue);

    let extended = services
        .issues
        .extend_due_date(issue_id, Utc::now() + Duration::days(7))
        .await
        .unwrap();
    assert_eq!(extended.status, IssueStatus::Issued);
    assert!(services.issues.list_overdue().await.unwrap().is_empty());
}
