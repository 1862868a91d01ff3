//! Books repository: catalog rows and the inventory ledger

use async_trait::async_trait;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook, UpdateBook},
};

const BOOK_COLUMNS: &str = "id, title, author, daily_fee, inventory, cover";

#[async_trait]
pub trait BooksRepository: Send + Sync {
    /// All books ordered by title
    async fn list(&self) -> AppResult<Vec<Book>>;

    async fn get_by_id(&self, id: i32) -> AppResult<Book>;

    async fn create(&self, book: &CreateBook) -> AppResult<Book>;

    /// Apply the present fields of `update`
    async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book>;

    /// Delete a book together with its borrowings and their payments
    async fn delete(&self, id: i32) -> AppResult<()>;

    /// Take one copy off the shelf, failing with `InsufficientInventory` when none is left
    async fn reserve(&self, id: i32) -> AppResult<Book>;

    /// Put one copy back on the shelf
    async fn release(&self, id: i32) -> AppResult<Book>;
}

// =========================================================================
// Ledger primitives, usable inside a caller's transaction
// =========================================================================

/// Lock the book row until the surrounding transaction ends
pub(crate) async fn lock_book(conn: &mut PgConnection, id: i32) -> AppResult<Book> {
    sqlx::query_as::<_, Book>(&format!(
        "SELECT {} FROM books WHERE id = $1 FOR UPDATE",
        BOOK_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
}

pub(crate) async fn reserve_in(conn: &mut PgConnection, id: i32) -> AppResult<Book> {
    let book = lock_book(conn, id).await?;

    if book.inventory < 1 {
        return Err(AppError::InsufficientInventory(id));
    }

    let book = sqlx::query_as::<_, Book>(&format!(
        "UPDATE books SET inventory = inventory - 1 WHERE id = $1 RETURNING {}",
        BOOK_COLUMNS
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(book)
}

pub(crate) async fn release_in(conn: &mut PgConnection, id: i32) -> AppResult<Book> {
    lock_book(conn, id).await?;

    let book = sqlx::query_as::<_, Book>(&format!(
        "UPDATE books SET inventory = inventory + 1 WHERE id = $1 RETURNING {}",
        BOOK_COLUMNS
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(book)
}

// =========================================================================
// PostgreSQL implementation
// =========================================================================

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksRepository for PgBooksRepository {
    async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books ORDER BY title, id",
            BOOK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (title, author, daily_fee, inventory, cover)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.daily_fee)
        .bind(book.inventory)
        .bind(book.cover)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        // Single statement, so the row lock covers the inventory change
        sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                daily_fee = COALESCE($4, daily_fee),
                inventory = COALESCE($5, inventory),
                cover = COALESCE($6, cover)
            WHERE id = $1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.author)
        .bind(update.daily_fee)
        .bind(update.inventory)
        .bind(update.cover)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        // Borrowings and payments go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        Ok(())
    }

    async fn reserve(&self, id: i32) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let book = reserve_in(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(book)
    }

    async fn release(&self, id: i32) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let book = release_in(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(book)
    }
}
