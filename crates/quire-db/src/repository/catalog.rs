//! # Catalog Repository
//!
//! Books and editions. The catalog is shared across tenants; a tenant binds to
//! an edition by holding a stock record for it. Only insert and lookup live
//! here, catalog maintenance belongs to the CRUD layer.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use quire_core::{Book, Edition};

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    pub async fn insert_book(&self, book: &Book) -> DbResult<()> {
        debug!(id = %book.id, title = %book.title, "Inserting book");

        sqlx::query(
            "INSERT INTO books (id, title, author, category, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.category)
        .bind(book.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_edition(&self, edition: &Edition) -> DbResult<()> {
        debug!(id = %edition.id, isbn = %edition.isbn, "Inserting edition");

        sqlx::query(
            r#"
            INSERT INTO editions (id, book_id, isbn, format, publisher, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&edition.id)
        .bind(&edition.book_id)
        .bind(&edition.isbn)
        .bind(&edition.format)
        .bind(&edition.publisher)
        .bind(edition.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Creates a book with a single edition in one transaction.
    pub async fn create_edition(
        &self,
        title: &str,
        author: &str,
        isbn: &str,
        format: &str,
    ) -> DbResult<Edition> {
        let now = Utc::now();
        let book = Book {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            author: author.to_string(),
            category: None,
            created_at: now,
        };
        let edition = Edition {
            id: Uuid::new_v4().to_string(),
            book_id: book.id.clone(),
            isbn: isbn.to_string(),
            format: format.to_string(),
            publisher: None,
            created_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO books (id, title, author, category, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.category)
        .bind(book.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO editions (id, book_id, isbn, format, publisher, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&edition.id)
        .bind(&edition.book_id)
        .bind(&edition.isbn)
        .bind(&edition.format)
        .bind(&edition.publisher)
        .bind(edition.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(edition_id = %edition.id, isbn = %edition.isbn, "Created edition");
        Ok(edition)
    }

    pub async fn get_edition(&self, id: &str) -> DbResult<Option<Edition>> {
        let edition = sqlx::query_as::<_, Edition>(
            "SELECT id, book_id, isbn, format, publisher, created_at FROM editions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(edition)
    }

    pub async fn edition_exists(&self, id: &str) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM editions WHERE id = ?1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
