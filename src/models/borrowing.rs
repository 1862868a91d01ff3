//! Borrowing model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::{book::BookShort, payment::Payment};

/// Borrowing model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrowing {
    pub id: i32,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    /// `None` while the book is still out
    pub actual_return_date: Option<NaiveDate>,
    pub book_id: i32,
    pub user_id: i32,
}

impl Borrowing {
    pub fn is_active(&self) -> bool {
        self.actual_return_date.is_none()
    }
}

/// Borrowing with its book and payments, for detail views
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowingDetails {
    #[serde(flatten)]
    pub borrowing: Borrowing,
    pub book: BookShort,
    pub is_active: bool,
    pub payments: Vec<Payment>,
}

/// Row to insert for a new borrowing
#[derive(Debug, Clone)]
pub struct NewBorrowing {
    pub book_id: i32,
    pub user_id: i32,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
}

/// Result of opening a borrowing
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowingCreated {
    #[serde(flatten)]
    pub borrowing: Borrowing,
    /// Rental fee session; absent when the fee is zero or the gateway failed
    pub payment: Option<Payment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_error: Option<String>,
}

/// Result of returning a borrowing
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowingReturned {
    #[serde(flatten)]
    pub borrowing: Borrowing,
    /// Late return fine session, if one was opened
    pub fine: Option<Payment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fine_error: Option<String>,
}

/// Create borrowing request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBorrowing {
    pub book_id: i32,
    /// Required; must not be before today
    pub expected_return_date: Option<NaiveDate>,
}

/// Borrowing list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BorrowingQuery {
    /// Only honored for staff callers
    pub user_id: Option<i32>,
    /// `true`/`1` for active, `false`/`0` for returned
    pub is_active: Option<String>,
}

/// Storage-level filter, produced by the access policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BorrowingFilter {
    pub user_id: Option<i32>,
    pub is_active: Option<bool>,
}

impl BorrowingFilter {
    pub fn matches(&self, borrowing: &Borrowing) -> bool {
        self.user_id.map_or(true, |id| borrowing.user_id == id)
            && self.is_active.map_or(true, |active| borrowing.is_active() == active)
    }
}

/// Parse the loose `is_active` query flag; unknown values disable the filter
pub fn parse_active_flag(value: Option<&str>) -> Option<bool> {
    match value.map(|v| v.to_lowercase()) {
        Some(v) if v == "true" || v == "1" => Some(true),
        Some(v) if v == "false" || v == "0" => Some(false),
        _ => None,
    }
}
