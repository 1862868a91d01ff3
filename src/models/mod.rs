//! Data models for the library rental service

pub mod book;
pub mod borrowing;
pub mod enums;
pub mod payment;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookShort};
pub use borrowing::{Borrowing, BorrowingDetails};
pub use enums::{CoverType, PaymentStatus, PaymentType};
pub use payment::Payment;
pub use user::UserClaims;
