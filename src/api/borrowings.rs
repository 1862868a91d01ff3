//! Borrowing endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::borrowing::{
        Borrowing, BorrowingCreated, BorrowingDetails, BorrowingQuery, BorrowingReturned,
        CreateBorrowing,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List borrowings visible to the caller
#[utoipa::path(
    get,
    path = "/borrowings",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(BorrowingQuery),
    responses(
        (status = 200, description = "Borrowings, newest first", body = Vec<Borrowing>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_borrowings(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowingQuery>,
) -> AppResult<Json<Vec<Borrowing>>> {
    let borrowings = state
        .services
        .borrowings
        .list_borrowings(&claims.caller(), &query)
        .await?;
    Ok(Json(borrowings))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrowings",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    request_body = CreateBorrowing,
    responses(
        (status = 201, description = "Borrowing created, with its rental fee session", body = BorrowingCreated),
        (status = 400, description = "Invalid date or no copy available"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn create_borrowing(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBorrowing>,
) -> AppResult<(StatusCode, Json<BorrowingCreated>)> {
    let created = state
        .services
        .borrowings
        .create_borrowing(&claims.caller(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get one borrowing with its book and payments
#[utoipa::path(
    get,
    path = "/borrowings/{id}",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing ID")
    ),
    responses(
        (status = 200, description = "Borrowing details", body = BorrowingDetails),
        (status = 404, description = "Borrowing not found")
    )
)]
pub async fn get_borrowing(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowingDetails>> {
    let details = state
        .services
        .borrowings
        .get_borrowing(&claims.caller(), id)
        .await?;
    Ok(Json(details))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrowings/{id}/return",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing ID")
    ),
    responses(
        (status = 200, description = "Book returned, with a fine session if late", body = BorrowingReturned),
        (status = 400, description = "Already returned"),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Borrowing not found")
    )
)]
pub async fn return_borrowing(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowingReturned>> {
    let returned = state
        .services
        .borrowings
        .return_borrowing(&claims.caller(), id)
        .await?;
    Ok(Json(returned))
}
