//! Borrowings repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use super::books::{release_in, reserve_in};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrowing::{Borrowing, BorrowingFilter, NewBorrowing},
    },
};

const BORROWING_COLUMNS: &str =
    "id, borrow_date, expected_return_date, actual_return_date, book_id, user_id";

#[async_trait]
pub trait BorrowingsRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Borrowing>;

    /// Newest first
    async fn list(&self, filter: &BorrowingFilter) -> AppResult<Vec<Borrowing>>;

    /// Reserve the book and insert the borrowing as one unit.
    ///
    /// Returns the new row and the book as it stands after the reservation.
    async fn create(&self, borrowing: &NewBorrowing) -> AppResult<(Borrowing, Book)>;

    /// Release the book and stamp the return date as one unit.
    ///
    /// Fails with `AlreadyReturned` without touching inventory when the
    /// borrowing is already closed, including when a concurrent return won.
    async fn mark_returned(&self, id: i32, returned_on: NaiveDate) -> AppResult<(Borrowing, Book)>;
}

#[derive(Clone)]
pub struct PgBorrowingsRepository {
    pool: Pool<Postgres>,
}

impl PgBorrowingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowingsRepository for PgBorrowingsRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Borrowing> {
        sqlx::query_as::<_, Borrowing>(&format!(
            "SELECT {} FROM borrowings WHERE id = $1",
            BORROWING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))
    }

    async fn list(&self, filter: &BorrowingFilter) -> AppResult<Vec<Borrowing>> {
        let borrowings = sqlx::query_as::<_, Borrowing>(&format!(
            r#"
            SELECT {}
            FROM borrowings
            WHERE ($1::INTEGER IS NULL OR user_id = $1)
              AND ($2::BOOLEAN IS NULL OR (actual_return_date IS NULL) = $2)
            ORDER BY borrow_date DESC, id DESC
            "#,
            BORROWING_COLUMNS
        ))
        .bind(filter.user_id)
        .bind(filter.is_active)
        .fetch_all(&self.pool)
        .await?;

        Ok(borrowings)
    }

    async fn create(&self, borrowing: &NewBorrowing) -> AppResult<(Borrowing, Book)> {
        let mut tx = self.pool.begin().await?;

        let book = reserve_in(&mut *tx, borrowing.book_id).await?;

        // A failed insert drops the transaction, which rolls the reservation back
        let created = sqlx::query_as::<_, Borrowing>(&format!(
            r#"
            INSERT INTO borrowings (borrow_date, expected_return_date, book_id, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            BORROWING_COLUMNS
        ))
        .bind(borrowing.borrow_date)
        .bind(borrowing.expected_return_date)
        .bind(borrowing.book_id)
        .bind(borrowing.user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((created, book))
    }

    async fn mark_returned(&self, id: i32, returned_on: NaiveDate) -> AppResult<(Borrowing, Book)> {
        let mut tx = self.pool.begin().await?;

        // Lock order: borrowing, then book
        let current = sqlx::query_as::<_, Borrowing>(&format!(
            "SELECT {} FROM borrowings WHERE id = $1 FOR UPDATE",
            BORROWING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))?;

        if !current.is_active() {
            return Err(AppError::AlreadyReturned(id));
        }

        let book = release_in(&mut *tx, current.book_id).await?;

        let returned = sqlx::query_as::<_, Borrowing>(&format!(
            "UPDATE borrowings SET actual_return_date = $2 WHERE id = $1 RETURNING {}",
            BORROWING_COLUMNS
        ))
        .bind(id)
        .bind(returned_on)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((returned, book))
    }
}
