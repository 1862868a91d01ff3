//! Payment sessions and their status transitions

use std::sync::Arc;

use rust_decimal::Decimal;

use super::gateway::{CheckoutRequest, PaymentGateway};
use crate::{
    config::PaymentsConfig,
    error::{AppError, AppResult},
    models::{
        enums::{PaymentStatus, PaymentType},
        payment::{NewPayment, Payment, PaymentFilter},
    },
    policy::{self, Action, Caller},
    repository::Repository,
};

/// Where the gateway sends the customer back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl RedirectUrls {
    pub fn from_config(config: &PaymentsConfig) -> Self {
        let base = config.public_base_url.trim_end_matches('/');
        Self {
            // {CHECKOUT_SESSION_ID} is filled in by Stripe
            success_url: format!("{}/api/v1/payments/success?session_id={{CHECKOUT_SESSION_ID}}", base),
            cancel_url: format!("{}/api/v1/payments/cancel", base),
        }
    }
}

#[derive(Clone)]
pub struct PaymentsService {
    repository: Repository,
    gateway: Arc<dyn PaymentGateway>,
    urls: RedirectUrls,
}

impl PaymentsService {
    pub fn new(repository: Repository, gateway: Arc<dyn PaymentGateway>, urls: RedirectUrls) -> Self {
        Self {
            repository,
            gateway,
            urls,
        }
    }

    /// Open a gateway session and record it as a PENDING payment
    pub async fn open_session(
        &self,
        borrowing_id: i32,
        kind: PaymentType,
        amount: Decimal,
        description: String,
    ) -> AppResult<Payment> {
        let session = self
            .gateway
            .create_session(&CheckoutRequest {
                amount,
                description,
                success_url: self.urls.success_url.clone(),
                cancel_url: self.urls.cancel_url.clone(),
            })
            .await?;

        let payment = self
            .repository
            .payments
            .create(&NewPayment {
                kind,
                borrowing_id,
                session_url: session.session_url,
                session_id: session.session_id,
                money_to_pay: amount,
            })
            .await?;

        tracing::info!(
            "Opened {} session {} for borrowing {} ({})",
            payment.kind,
            payment.session_id,
            borrowing_id,
            amount
        );

        Ok(payment)
    }

    /// Payments visible to the caller, newest first
    pub async fn list_payments(&self, caller: &Caller) -> AppResult<Vec<Payment>> {
        self.repository
            .payments
            .list(&policy::visible_payments(caller))
            .await
    }

    pub async fn get_payment(&self, caller: &Caller, id: i32) -> AppResult<Payment> {
        let payment = self.repository.payments.get_by_id(id).await?;
        let borrowing = self.repository.borrowings.get_by_id(payment.borrowing_id).await?;
        policy::authorize(caller, borrowing.user_id, Action::View, "Payment")?;
        Ok(payment)
    }

    /// All payments attached to one borrowing
    pub async fn for_borrowing(&self, borrowing_id: i32) -> AppResult<Vec<Payment>> {
        self.repository
            .payments
            .list(&PaymentFilter {
                user_id: None,
                borrowing_id: Some(borrowing_id),
            })
            .await
    }

    /// Reconcile a payment with the gateway after the success redirect.
    ///
    /// Settled payments are returned as they are, so repeating the redirect is harmless.
    pub async fn confirm_session(&self, session_id: &str) -> AppResult<Payment> {
        let payment = self.repository.payments.get_by_session_id(session_id).await?;
        if payment.status != PaymentStatus::Pending {
            return Ok(payment);
        }

        let status = self.gateway.get_session_status(session_id).await?;

        let target = if status.paid {
            PaymentStatus::Paid
        } else if status.expired {
            PaymentStatus::Expired
        } else {
            tracing::debug!("Session {} not paid yet", session_id);
            return Ok(payment);
        };

        let updated = self
            .repository
            .payments
            .update_status(payment.id, PaymentStatus::Pending, target)
            .await?;
        tracing::info!("Payment {} is now {}", updated.id, updated.status);

        Ok(updated)
    }

    /// Give up on a PENDING payment
    pub async fn expire_payment(&self, id: i32) -> AppResult<Payment> {
        let payment = self.repository.payments.get_by_id(id).await?;
        if !payment.status.can_transition_to(PaymentStatus::Expired) {
            return Err(AppError::BadRequest(format!(
                "Payment {} is {} and cannot expire",
                id, payment.status
            )));
        }

        let updated = self
            .repository
            .payments
            .update_status(id, PaymentStatus::Pending, PaymentStatus::Expired)
            .await?;

        // Lost a race with a confirmation
        if updated.status != PaymentStatus::Expired {
            return Err(AppError::BadRequest(format!(
                "Payment {} is {} and cannot expire",
                id, updated.status
            )));
        }

        tracing::info!("Payment {} expired", id);
        Ok(updated)
    }
}
