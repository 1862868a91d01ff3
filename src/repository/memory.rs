//! In-process store implementing every repository trait.
//!
//! Each book and borrowing row sits behind its own async mutex, so
//! reservations on different books never contend. The maps themselves are
//! guarded by short-lived std locks that are never held across an await.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use super::{
    books::BooksRepository, borrowings::BorrowingsRepository, payments::PaymentsRepository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, CreateBook, UpdateBook},
        borrowing::{Borrowing, BorrowingFilter, NewBorrowing},
        enums::PaymentStatus,
        payment::{NewPayment, Payment, PaymentFilter},
    },
};

type Row<T> = Arc<Mutex<T>>;

#[derive(Default)]
pub struct MemoryStore {
    books: RwLock<BTreeMap<i32, Row<Book>>>,
    borrowings: RwLock<BTreeMap<i32, Row<Borrowing>>>,
    payments: RwLock<BTreeMap<i32, Payment>>,
    book_seq: AtomicI32,
    borrowing_seq: AtomicI32,
    payment_seq: AtomicI32,
}

fn read<T>(lock: &RwLock<T>) -> AppResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> AppResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
}

fn next_id(seq: &AtomicI32) -> i32 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

fn book_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}

fn borrowing_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Borrowing with id {} not found", id))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn book_row(&self, id: i32) -> AppResult<Row<Book>> {
        read(&self.books)?
            .get(&id)
            .cloned()
            .ok_or_else(|| book_not_found(id))
    }

    fn borrowing_row(&self, id: i32) -> AppResult<Row<Borrowing>> {
        read(&self.borrowings)?
            .get(&id)
            .cloned()
            .ok_or_else(|| borrowing_not_found(id))
    }

    fn book_exists(&self, id: i32) -> AppResult<bool> {
        Ok(read(&self.books)?.contains_key(&id))
    }

    async fn snapshot<T: Clone>(rows: Vec<Row<T>>) -> Vec<T> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.lock().await.clone());
        }
        out
    }
}

#[async_trait]
impl BooksRepository for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Book>> {
        let rows: Vec<_> = read(&self.books)?.values().cloned().collect();
        let mut books = Self::snapshot(rows).await;
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        let row = self.book_row(id)?;
        let book = row.lock().await.clone();
        Ok(book)
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = Book {
            id: next_id(&self.book_seq),
            title: book.title.clone(),
            author: book.author.clone(),
            daily_fee: book.daily_fee,
            inventory: book.inventory,
            cover: book.cover,
        };
        write(&self.books)?.insert(created.id, Arc::new(Mutex::new(created.clone())));
        Ok(created)
    }

    async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let row = self.book_row(id)?;
        let mut book = row.lock().await;
        if !self.book_exists(id)? {
            return Err(book_not_found(id));
        }
        update.apply_to(&mut book);
        Ok(book.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        {
            // Book lock is released before touching borrowing rows, which lock in the other order
            let row = self.book_row(id)?;
            let _book = row.lock().await;
            if write(&self.books)?.remove(&id).is_none() {
                return Err(book_not_found(id));
            }
        }

        let borrowing_rows: Vec<_> = read(&self.borrowings)?
            .iter()
            .map(|(id, row)| (*id, row.clone()))
            .collect();
        let mut orphaned = Vec::new();
        for (borrowing_id, row) in borrowing_rows {
            if row.lock().await.book_id == id {
                orphaned.push(borrowing_id);
            }
        }

        {
            let mut borrowings = write(&self.borrowings)?;
            for borrowing_id in &orphaned {
                borrowings.remove(borrowing_id);
            }
        }

        write(&self.payments)?.retain(|_, p| !orphaned.contains(&p.borrowing_id));
        Ok(())
    }

    async fn reserve(&self, id: i32) -> AppResult<Book> {
        let row = self.book_row(id)?;
        let mut book = row.lock().await;
        if !self.book_exists(id)? {
            return Err(book_not_found(id));
        }
        if book.inventory < 1 {
            return Err(AppError::InsufficientInventory(id));
        }
        book.inventory -= 1;
        Ok(book.clone())
    }

    async fn release(&self, id: i32) -> AppResult<Book> {
        let row = self.book_row(id)?;
        let mut book = row.lock().await;
        if !self.book_exists(id)? {
            return Err(book_not_found(id));
        }
        book.inventory += 1;
        Ok(book.clone())
    }
}

#[async_trait]
impl BorrowingsRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Borrowing> {
        let row = self.borrowing_row(id)?;
        let borrowing = row.lock().await.clone();
        Ok(borrowing)
    }

    async fn list(&self, filter: &BorrowingFilter) -> AppResult<Vec<Borrowing>> {
        let rows: Vec<_> = read(&self.borrowings)?.values().cloned().collect();
        let mut borrowings: Vec<_> = Self::snapshot(rows)
            .await
            .into_iter()
            .filter(|b| filter.matches(b))
            .collect();
        borrowings.sort_by(|a, b| b.borrow_date.cmp(&a.borrow_date).then(b.id.cmp(&a.id)));
        Ok(borrowings)
    }

    async fn create(&self, borrowing: &NewBorrowing) -> AppResult<(Borrowing, Book)> {
        if borrowing.expected_return_date < borrowing.borrow_date {
            return Err(AppError::Validation(
                "Expected return date cannot precede the borrow date".to_string(),
            ));
        }

        let row = self.book_row(borrowing.book_id)?;
        let mut book = row.lock().await;
        if !self.book_exists(borrowing.book_id)? {
            return Err(book_not_found(borrowing.book_id));
        }
        if book.inventory < 1 {
            return Err(AppError::InsufficientInventory(borrowing.book_id));
        }

        let created = Borrowing {
            id: next_id(&self.borrowing_seq),
            borrow_date: borrowing.borrow_date,
            expected_return_date: borrowing.expected_return_date,
            actual_return_date: None,
            book_id: borrowing.book_id,
            user_id: borrowing.user_id,
        };

        // Insert first: if it fails, the inventory has not moved yet
        write(&self.borrowings)?.insert(created.id, Arc::new(Mutex::new(created.clone())));
        book.inventory -= 1;

        Ok((created, book.clone()))
    }

    async fn mark_returned(&self, id: i32, returned_on: NaiveDate) -> AppResult<(Borrowing, Book)> {
        let row = self.borrowing_row(id)?;
        let mut borrowing = row.lock().await;

        if !borrowing.is_active() {
            return Err(AppError::AlreadyReturned(id));
        }

        let book_row = self.book_row(borrowing.book_id)?;
        let mut book = book_row.lock().await;
        book.inventory += 1;
        borrowing.actual_return_date = Some(returned_on);

        Ok((borrowing.clone(), book.clone()))
    }
}

#[async_trait]
impl PaymentsRepository for MemoryStore {
    async fn create(&self, payment: &NewPayment) -> AppResult<Payment> {
        if read(&self.borrowings)?.get(&payment.borrowing_id).is_none() {
            return Err(borrowing_not_found(payment.borrowing_id));
        }

        let mut payments = write(&self.payments)?;
        if payments.values().any(|p| p.session_id == payment.session_id) {
            return Err(AppError::Internal(format!(
                "duplicate payment session id {}",
                payment.session_id
            )));
        }

        let created = Payment {
            id: next_id(&self.payment_seq),
            status: PaymentStatus::Pending,
            kind: payment.kind,
            borrowing_id: payment.borrowing_id,
            session_url: payment.session_url.clone(),
            session_id: payment.session_id.clone(),
            money_to_pay: payment.money_to_pay,
        };
        payments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Payment> {
        read(&self.payments)?
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Payment with id {} not found", id)))
    }

    async fn get_by_session_id(&self, session_id: &str) -> AppResult<Payment> {
        read(&self.payments)?
            .values()
            .find(|p| p.session_id == session_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("No payment for this session".to_string()))
    }

    async fn list(&self, filter: &PaymentFilter) -> AppResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = read(&self.payments)?
            .values()
            .filter(|p| filter.borrowing_id.map_or(true, |id| p.borrowing_id == id))
            .cloned()
            .collect();

        if let Some(user_id) = filter.user_id {
            let mut owned = Vec::with_capacity(payments.len());
            for payment in payments {
                let row = self.borrowing_row(payment.borrowing_id)?;
                if row.lock().await.user_id == user_id {
                    owned.push(payment);
                }
            }
            payments = owned;
        }

        payments.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(payments)
    }

    async fn update_status(&self, id: i32, from: PaymentStatus, to: PaymentStatus) -> AppResult<Payment> {
        let mut payments = write(&self.payments)?;
        let payment = payments
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Payment with id {} not found", id)))?;
        if payment.status == from {
            payment.status = to;
        }
        Ok(payment.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{CoverType, PaymentType};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    async fn store_with_book(inventory: i32) -> (Arc<MemoryStore>, Book) {
        let store = Arc::new(MemoryStore::new());
        let book = BooksRepository::create(
            store.as_ref(),
            &CreateBook {
                title: "Solaris".to_string(),
                author: "Stanislaw Lem".to_string(),
                daily_fee: dec!(1.50),
                inventory,
                cover: CoverType::Soft,
            },
        )
        .await
        .unwrap();
        (store, book)
    }

    fn new_borrowing(book_id: i32, user_id: i32) -> NewBorrowing {
        NewBorrowing {
            book_id,
            user_id,
            borrow_date: day(1),
            expected_return_date: day(8),
        }
    }

    #[tokio::test]
    async fn test_reserve_never_goes_negative() {
        let (store, book) = store_with_book(1).await;

        assert_eq!(store.reserve(book.id).await.unwrap().inventory, 0);
        assert!(matches!(
            store.reserve(book.id).await,
            Err(AppError::InsufficientInventory(_))
        ));
        assert_eq!(BooksRepository::get_by_id(store.as_ref(), book.id).await.unwrap().inventory, 0);
        assert_eq!(store.release(book.id).await.unwrap().inventory, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_are_serialized() {
        let (store, book) = store_with_book(3).await;

        let book_id = book.id;
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.reserve(book_id).await }));
        }

        let mut granted = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => granted += 1,
                Err(AppError::InsufficientInventory(_)) => refused += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(granted, 3);
        assert_eq!(refused, 17);
        assert_eq!(BooksRepository::get_by_id(store.as_ref(), book.id).await.unwrap().inventory, 0);
    }

    #[tokio::test]
    async fn test_create_borrowing_without_stock_leaves_no_row() {
        let (store, book) = store_with_book(0).await;

        let result = BorrowingsRepository::create(store.as_ref(), &new_borrowing(book.id, 5)).await;
        assert!(matches!(result, Err(AppError::InsufficientInventory(_))));
        assert!(BorrowingsRepository::list(store.as_ref(), &BorrowingFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_returns_release_once() {
        let (store, book) = store_with_book(1).await;
        let (borrowing, _) = BorrowingsRepository::create(store.as_ref(), &new_borrowing(book.id, 5))
            .await
            .unwrap();
        let borrowing_id = borrowing.id;

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.mark_returned(borrowing_id, day(5)).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.mark_returned(borrowing_id, day(5)).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::AlreadyReturned(_)))));
        assert_eq!(BooksRepository::get_by_id(store.as_ref(), book.id).await.unwrap().inventory, 1);
    }

    #[tokio::test]
    async fn test_delete_book_cascades() {
        let (store, book) = store_with_book(2).await;
        let (borrowing, _) = BorrowingsRepository::create(store.as_ref(), &new_borrowing(book.id, 5))
            .await
            .unwrap();
        PaymentsRepository::create(
            store.as_ref(),
            &NewPayment {
                kind: PaymentType::Payment,
                borrowing_id: borrowing.id,
                session_url: "https://pay.example/s/1".to_string(),
                session_id: "cs_1".to_string(),
                money_to_pay: dec!(10.50),
            },
        )
        .await
        .unwrap();

        BooksRepository::delete(store.as_ref(), book.id).await.unwrap();

        assert!(matches!(
            BorrowingsRepository::get_by_id(store.as_ref(), borrowing.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(PaymentsRepository::list(store.as_ref(), &PaymentFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_status_is_conditional() {
        let (store, book) = store_with_book(1).await;
        let (borrowing, _) = BorrowingsRepository::create(store.as_ref(), &new_borrowing(book.id, 5))
            .await
            .unwrap();
        let payment = PaymentsRepository::create(
            store.as_ref(),
            &NewPayment {
                kind: PaymentType::Fine,
                borrowing_id: borrowing.id,
                session_url: "https://pay.example/s/2".to_string(),
                session_id: "cs_2".to_string(),
                money_to_pay: dec!(3.00),
            },
        )
        .await
        .unwrap();

        let paid = store
            .update_status(payment.id, PaymentStatus::Pending, PaymentStatus::Paid)
            .await
            .unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);

        let unchanged = store
            .update_status(payment.id, PaymentStatus::Pending, PaymentStatus::Expired)
            .await
            .unwrap();
        assert_eq!(unchanged.status, PaymentStatus::Paid);
    }
}
