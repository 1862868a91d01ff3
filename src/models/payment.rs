//! Payment model and related types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::{PaymentStatus, PaymentType};

/// Payment model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: i32,
    pub status: PaymentStatus,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: PaymentType,
    pub borrowing_id: i32,
    pub session_url: String,
    pub session_id: String,
    #[schema(value_type = String, example = "10.00")]
    pub money_to_pay: Decimal,
}

/// Row to insert once a gateway session exists
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub kind: PaymentType,
    pub borrowing_id: i32,
    pub session_url: String,
    pub session_id: String,
    pub money_to_pay: Decimal,
}

/// Storage-level filter for payment listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentFilter {
    /// Owner of the parent borrowing
    pub user_id: Option<i32>,
    pub borrowing_id: Option<i32>,
}
