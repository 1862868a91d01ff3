//! Borrowing lifecycle: checkout, return, and the charges they trigger

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use super::{fines, notifications::NotificationService, payments::PaymentsService};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookShort,
        borrowing::{
            Borrowing, BorrowingCreated, BorrowingDetails, BorrowingQuery, BorrowingReturned,
            CreateBorrowing, NewBorrowing,
        },
        enums::PaymentType,
        payment::Payment,
    },
    policy::{self, Action, Caller},
    repository::Repository,
};

/// Source of "today"
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Clone)]
pub struct BorrowingsService {
    repository: Repository,
    payments: PaymentsService,
    notifications: NotificationService,
    clock: Clock,
}

/// Split a post-commit payment attempt into the response fields
fn settle(result: AppResult<Payment>, borrowing_id: i32) -> (Option<Payment>, Option<String>) {
    match result {
        Ok(payment) => (Some(payment), None),
        Err(e) => {
            tracing::warn!("Payment session for borrowing {} failed: {}", borrowing_id, e);
            let message = match e {
                AppError::Database(_) | AppError::Internal(_) => "Payment could not be recorded".to_string(),
                other => other.to_string(),
            };
            (None, Some(message))
        }
    }
}

impl BorrowingsService {
    pub fn new(repository: Repository, payments: PaymentsService, notifications: NotificationService) -> Self {
        Self {
            repository,
            payments,
            notifications,
            clock: Arc::new(|| Utc::now().date_naive()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// Check a book out to the caller and open the rental fee session
    pub async fn create_borrowing(&self, caller: &Caller, request: CreateBorrowing) -> AppResult<BorrowingCreated> {
        let today = self.today();
        let expected_return_date = request
            .expected_return_date
            .ok_or_else(|| AppError::Validation("expected_return_date is required".to_string()))?;
        if expected_return_date < today {
            return Err(AppError::Validation(
                "expected_return_date cannot be in the past".to_string(),
            ));
        }

        let book = self.repository.books.get_by_id(request.book_id).await?;
        fines::rental_fee(today, expected_return_date, book.daily_fee)?;

        let (borrowing, book) = self
            .repository
            .borrowings
            .create(&NewBorrowing {
                book_id: request.book_id,
                user_id: caller.user_id,
                borrow_date: today,
                expected_return_date,
            })
            .await?;

        tracing::info!(
            "Borrowing {} opened: book {} to user {}, {} left",
            borrowing.id,
            book.id,
            borrowing.user_id,
            book.inventory
        );

        let (payment, payment_error) =
            match fines::rental_fee(borrowing.borrow_date, borrowing.expected_return_date, book.daily_fee) {
                Ok(fee) if fee.is_zero() => (None, None),
                Ok(fee) => {
                    let result = self
                        .payments
                        .open_session(
                            borrowing.id,
                            PaymentType::Payment,
                            fee,
                            format!("Borrowing book: {}", book.title),
                        )
                        .await;
                    settle(result, borrowing.id)
                }
                Err(e) => settle(Err(e), borrowing.id),
            };

        self.notifications.dispatch(format!(
            "New borrowing #{}: user {} took \"{}\" by {}, due back {}",
            borrowing.id, borrowing.user_id, book.title, book.author, borrowing.expected_return_date
        ));

        Ok(BorrowingCreated {
            borrowing,
            payment,
            payment_error,
        })
    }

    /// Close a borrowing, put the copy back and charge a fine if it is late
    pub async fn return_borrowing(&self, caller: &Caller, id: i32) -> AppResult<BorrowingReturned> {
        let current = self.repository.borrowings.get_by_id(id).await?;
        policy::authorize(caller, current.user_id, Action::View, "Borrowing")?;
        policy::authorize(caller, current.user_id, Action::Mutate, "Borrowing")?;
        if !current.is_active() {
            return Err(AppError::AlreadyReturned(id));
        }

        let (borrowing, book) = self
            .repository
            .borrowings
            .mark_returned(id, self.today())
            .await?;

        let actual_return_date = borrowing.actual_return_date.unwrap_or_else(|| self.today());
        let late = fines::days_late(borrowing.expected_return_date, actual_return_date);
        tracing::info!("Borrowing {} returned, {} day(s) late", borrowing.id, late);

        self.notifications.dispatch(format!(
            "Borrowing #{} returned: user {} brought back \"{}\" on {}",
            borrowing.id, borrowing.user_id, book.title, actual_return_date
        ));

        let (fine, fine_error) = match fines::fine(borrowing.expected_return_date, actual_return_date, book.daily_fee) {
            Ok(amount) if amount.is_zero() => (None, None),
            Ok(amount) => {
                let result = self
                    .payments
                    .open_session(
                        borrowing.id,
                        PaymentType::Fine,
                        amount,
                        format!("Late return fine: {} ({} days)", book.title, late),
                    )
                    .await;
                settle(result, borrowing.id)
            }
            Err(e) => settle(Err(e), borrowing.id),
        };

        Ok(BorrowingReturned {
            borrowing,
            fine,
            fine_error,
        })
    }

    /// Borrowing with its book and payments
    pub async fn get_borrowing(&self, caller: &Caller, id: i32) -> AppResult<BorrowingDetails> {
        let borrowing = self.repository.borrowings.get_by_id(id).await?;
        policy::authorize(caller, borrowing.user_id, Action::View, "Borrowing")?;

        let book = self.repository.books.get_by_id(borrowing.book_id).await?;
        let payments = self.payments.for_borrowing(borrowing.id).await?;

        Ok(BorrowingDetails {
            is_active: borrowing.is_active(),
            book: BookShort::from(&book),
            borrowing,
            payments,
        })
    }

    pub async fn list_borrowings(&self, caller: &Caller, query: &BorrowingQuery) -> AppResult<Vec<Borrowing>> {
        self.repository
            .borrowings
            .list(&policy::visible_borrowings(caller, query))
            .await
    }
}
