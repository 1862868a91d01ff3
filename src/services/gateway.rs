//! Payment gateway adapter (Stripe Checkout)

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Deserialize;

use crate::{
    config::PaymentsConfig,
    error::{AppError, AppResult},
};

/// Hosted checkout request
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub amount: Decimal,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Hosted checkout session as created by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub session_url: String,
}

/// Gateway view of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatus {
    pub paid: bool,
    pub expired: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession>;

    async fn get_session_status(&self, session_id: &str) -> AppResult<SessionStatus>;
}

/// Convert a currency amount to the integer minor unit the gateway expects
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .filter(|cents| *cents >= 0)
        .ok_or_else(|| AppError::Gateway(format!("Amount {} cannot be charged", amount)))
}

#[derive(Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    config: PaymentsConfig,
}

impl StripeGateway {
    pub fn new(config: PaymentsConfig) -> AppResult<Self> {
        if config.stripe_secret_key.is_empty() {
            tracing::warn!("Stripe secret key is empty, checkout sessions will be rejected");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.config.stripe_api_base.trim_end_matches('/')
        )
    }

    async fn parse_session(response: reqwest::Response) -> AppResult<StripeSession> {
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "no details".to_string());
            return Err(AppError::Gateway(format!("Stripe returned {}: {}", status, detail)));
        }

        response
            .json::<StripeSession>()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid Stripe response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        let unit_amount = to_minor_units(request.amount)?.to_string();
        let params = [
            ("mode", "payment"),
            ("payment_method_types[]", "card"),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", self.config.currency.as_str()),
            ("line_items[0][price_data][unit_amount]", unit_amount.as_str()),
            ("line_items[0][price_data][product_data][name]", request.description.as_str()),
            ("success_url", request.success_url.as_str()),
            ("cancel_url", request.cancel_url.as_str()),
        ];

        tracing::debug!("Creating Stripe session for {} ({})", request.description, unit_amount);

        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.config.stripe_secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        let session = Self::parse_session(response).await?;
        let session_url = session
            .url
            .ok_or_else(|| AppError::Gateway("Stripe session has no URL".to_string()))?;

        Ok(CheckoutSession {
            session_id: session.id,
            session_url,
        })
    }

    async fn get_session_status(&self, session_id: &str) -> AppResult<SessionStatus> {
        let response = self
            .client
            .get(format!("{}/{}", self.sessions_url(), session_id))
            .bearer_auth(&self.config.stripe_secret_key)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        let session = Self::parse_session(response).await?;

        Ok(SessionStatus {
            paid: session.payment_status.as_deref() == Some("paid"),
            expired: session.status.as_deref() == Some("expired"),
        })
    }
}
