//! Catalog management service

use validator::Validate;

use crate::{
    error::AppResult,
    models::book::{Book, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List all books
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        let created = self.repository.books.create(&book).await?;
        tracing::info!("Catalog: created book id={} ({})", created.id, created.title);
        Ok(created)
    }

    /// Replace every field of a book
    pub async fn replace_book(&self, id: i32, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        self.repository.books.update(id, &UpdateBook::from(book)).await
    }

    /// Update only the fields present in `update`
    pub async fn update_book(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        update.validate_fields()?;
        self.repository.books.update(id, &update).await
    }

    /// Delete a book; its borrowings and payments go with it
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!("Catalog: deleted book id={}", id);
        Ok(())
    }
}
