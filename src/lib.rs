//! Library Rental Service
//!
//! REST JSON backend for renting out books: a per-book inventory ledger,
//! the borrowing lifecycle, rental fees and late fines collected through a
//! hosted payment gateway, and best-effort staff notifications.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
