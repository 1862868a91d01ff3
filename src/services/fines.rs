//! Rental fee and late fine computation

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{AppError, AppResult};

/// Currency minor unit: amounts are kept to cents
const MONEY_SCALE: u32 = 2;

/// Largest amount a payment can carry (`NUMERIC(10,2)`)
pub fn max_charge() -> Decimal {
    Decimal::new(9_999_999_999, MONEY_SCALE)
}

fn to_money(amount: Decimal) -> Decimal {
    amount
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .max(Decimal::ZERO)
}

fn charge(days: i64, daily_fee: Decimal) -> AppResult<Decimal> {
    if days <= 0 {
        return Ok(Decimal::ZERO);
    }
    Decimal::from(days)
        .checked_mul(daily_fee)
        .map(to_money)
        .filter(|amount| *amount <= max_charge())
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Charge for {} day(s) at {} per day exceeds the payable limit",
                days, daily_fee
            ))
        })
}

/// Fee charged up front: whole days between borrow and expected return
pub fn rental_fee(borrow_date: NaiveDate, expected_return_date: NaiveDate, daily_fee: Decimal) -> AppResult<Decimal> {
    charge((expected_return_date - borrow_date).num_days(), daily_fee)
}

/// Whole days past the expected return date, zero when on time
pub fn days_late(expected_return_date: NaiveDate, actual_return_date: NaiveDate) -> i64 {
    (actual_return_date - expected_return_date).num_days().max(0)
}

/// Fine owed for a late return; zero when returned on or before the expected date
pub fn fine(expected_return_date: NaiveDate, actual_return_date: NaiveDate, daily_fee: Decimal) -> AppResult<Decimal> {
    charge(days_late(expected_return_date, actual_return_date), daily_fee)
}
