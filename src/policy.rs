//! Access policy: which borrowings and payments a caller may see or act on.
//!
//! Everything here is a pure function of the caller and the resource owner,
//! so it can be exercised without a transport or a database.

use crate::{
    error::{AppError, AppResult},
    models::{
        borrowing::{parse_active_flag, BorrowingFilter, BorrowingQuery},
        payment::PaymentFilter,
    },
};

/// Identity of the current caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i32,
    pub is_staff: bool,
}

/// What the caller wants to do with a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Mutate,
}

/// Decision for a single resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Staff may do anything; everyone else only touches what they own.
pub fn check(caller: &Caller, owner_id: i32) -> Access {
    if caller.is_staff || caller.user_id == owner_id {
        Access::Allow
    } else {
        Access::Deny
    }
}

/// Enforce [`check`] for one resource.
///
/// A denied view reports `NotFound` so foreign rows stay invisible; a denied
/// mutation reports `Forbidden`.
pub fn authorize(caller: &Caller, owner_id: i32, action: Action, resource: &str) -> AppResult<()> {
    match (check(caller, owner_id), action) {
        (Access::Allow, _) => Ok(()),
        (Access::Deny, Action::View) => Err(AppError::NotFound(format!("{} not found", resource))),
        (Access::Deny, Action::Mutate) => Err(AppError::Authorization(format!(
            "Not allowed to modify {}",
            resource
        ))),
    }
}

/// Listing filter for borrowings visible to `caller`
pub fn visible_borrowings(caller: &Caller, query: &BorrowingQuery) -> BorrowingFilter {
    let user_id = if caller.is_staff {
        query.user_id
    } else {
        Some(caller.user_id)
    };

    BorrowingFilter {
        user_id,
        is_active: parse_active_flag(query.is_active.as_deref()),
    }
}

/// Listing filter for payments visible to `caller`, via the borrowing owner
pub fn visible_payments(caller: &Caller) -> PaymentFilter {
    PaymentFilter {
        user_id: (!caller.is_staff).then_some(caller.user_id),
        borrowing_id: None,
    }
}
