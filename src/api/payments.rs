//! Payment endpoints and gateway redirects

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, AppResult},
    models::{enums::PaymentStatus, payment::Payment},
    AppState,
};

use super::AuthenticatedUser;

/// Query string appended by the gateway on redirect
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

/// Outcome of a success redirect
#[derive(Serialize, ToSchema)]
pub struct PaymentConfirmation {
    pub detail: String,
    pub payment: Payment,
}

/// Informational reply to a cancelled checkout
#[derive(Serialize, ToSchema)]
pub struct CancelResponse {
    pub detail: String,
}

/// List payments visible to the caller
#[utoipa::path(
    get,
    path = "/payments",
    tag = "payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payments, newest first", body = Vec<Payment>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_payments(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Payment>>> {
    let payments = state.services.payments.list_payments(&claims.caller()).await?;
    Ok(Json(payments))
}

/// Get a payment by ID
#[utoipa::path(
    get,
    path = "/payments/{id}",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment", body = Payment),
        (status = 404, description = "Payment not found")
    )
)]
pub async fn get_payment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Payment>> {
    let payment = state.services.payments.get_payment(&claims.caller(), id).await?;
    Ok(Json(payment))
}

/// Gateway success redirect: reconcile the session status
#[utoipa::path(
    get,
    path = "/payments/success",
    tag = "payments",
    params(SessionQuery),
    responses(
        (status = 200, description = "Payment status after reconciliation", body = PaymentConfirmation),
        (status = 400, description = "Missing session_id"),
        (status = 404, description = "Unknown session"),
        (status = 502, description = "Gateway unavailable")
    )
)]
pub async fn payment_success(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> AppResult<Json<PaymentConfirmation>> {
    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("session_id is required".to_string()))?;

    let payment = state.services.payments.confirm_session(&session_id).await?;

    let detail = match payment.status {
        PaymentStatus::Paid => "Payment successful",
        PaymentStatus::Pending => "Payment not completed yet",
        PaymentStatus::Expired => "Payment session expired",
    };

    Ok(Json(PaymentConfirmation {
        detail: detail.to_string(),
        payment,
    }))
}

/// Gateway cancel redirect; the payment stays pending
#[utoipa::path(
    get,
    path = "/payments/cancel",
    tag = "payments",
    responses(
        (status = 200, description = "Checkout cancelled", body = CancelResponse)
    )
)]
pub async fn payment_cancel() -> Json<CancelResponse> {
    Json(CancelResponse {
        detail: "Payment was cancelled. You can complete it later while the session is still open."
            .to_string(),
    })
}

/// Mark a pending payment as expired
#[utoipa::path(
    post,
    path = "/payments/{id}/expire",
    tag = "payments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Payment ID")
    ),
    responses(
        (status = 200, description = "Payment expired", body = Payment),
        (status = 400, description = "Payment is not pending"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Payment not found")
    )
)]
pub async fn expire_payment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Payment>> {
    claims.require_staff()?;

    let payment = state.services.payments.expire_payment(id).await?;
    Ok(Json(payment))
}
