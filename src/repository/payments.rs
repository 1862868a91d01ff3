//! Payments repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::PaymentStatus,
        payment::{NewPayment, Payment, PaymentFilter},
    },
};

const PAYMENT_COLUMNS: &str =
    "p.id, p.status, p.type, p.borrowing_id, p.session_url, p.session_id, p.money_to_pay";

#[async_trait]
pub trait PaymentsRepository: Send + Sync {
    /// Insert a PENDING payment
    async fn create(&self, payment: &NewPayment) -> AppResult<Payment>;

    async fn get_by_id(&self, id: i32) -> AppResult<Payment>;

    async fn get_by_session_id(&self, session_id: &str) -> AppResult<Payment>;

    /// Newest first
    async fn list(&self, filter: &PaymentFilter) -> AppResult<Vec<Payment>>;

    /// Move the payment from `from` to `to` if it is still in `from`.
    ///
    /// Returns the row as it stands afterwards, whether or not this call changed it.
    async fn update_status(&self, id: i32, from: PaymentStatus, to: PaymentStatus) -> AppResult<Payment>;
}

#[derive(Clone)]
pub struct PgPaymentsRepository {
    pool: Pool<Postgres>,
}

impl PgPaymentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentsRepository for PgPaymentsRepository {
    async fn create(&self, payment: &NewPayment) -> AppResult<Payment> {
        let created = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments AS p (status, type, borrowing_id, session_url, session_id, money_to_pay)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(PaymentStatus::Pending)
        .bind(payment.kind)
        .bind(payment.borrowing_id)
        .bind(&payment.session_url)
        .bind(&payment.session_id)
        .bind(payment.money_to_pay)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments p WHERE p.id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment with id {} not found", id)))
    }

    async fn get_by_session_id(&self, session_id: &str) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments p WHERE p.session_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No payment for this session".to_string()))
    }

    async fn list(&self, filter: &PaymentFilter) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {}
            FROM payments p
            JOIN borrowings b ON b.id = p.borrowing_id
            WHERE ($1::INTEGER IS NULL OR b.user_id = $1)
              AND ($2::INTEGER IS NULL OR p.borrowing_id = $2)
            ORDER BY p.id DESC
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(filter.user_id)
        .bind(filter.borrowing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    async fn update_status(&self, id: i32, from: PaymentStatus, to: PaymentStatus) -> AppResult<Payment> {
        let updated = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments p SET status = $3 WHERE p.id = $1 AND p.status = $2 RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(payment) => Ok(payment),
            None => self.get_by_id(id).await,
        }
    }
}
