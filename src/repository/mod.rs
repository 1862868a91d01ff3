//! Repository layer for storage operations

pub mod books;
pub mod borrowings;
pub mod memory;
pub mod payments;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::error::AppResult;

pub use books::BooksRepository;
pub use borrowings::BorrowingsRepository;
pub use payments::PaymentsRepository;

/// Main repository struct holding one handle per aggregate
#[derive(Clone)]
pub struct Repository {
    pool: Option<Pool<Postgres>>,
    pub books: Arc<dyn BooksRepository>,
    pub borrowings: Arc<dyn BorrowingsRepository>,
    pub payments: Arc<dyn PaymentsRepository>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::PgBooksRepository::new(pool.clone())),
            borrowings: Arc::new(borrowings::PgBorrowingsRepository::new(pool.clone())),
            payments: Arc::new(payments::PgPaymentsRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Repository backed by a fresh in-process store
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            pool: None,
            books: store.clone(),
            borrowings: store.clone(),
            payments: store,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}
