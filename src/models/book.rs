//! Book (catalog + inventory) model and related types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use super::enums::CoverType;

/// Book model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    /// Rental price per day, two fractional digits
    #[schema(value_type = String, example = "2.50")]
    pub daily_fee: Decimal,
    /// Copies currently on the shelf
    pub inventory: i32,
    pub cover: CoverType,
}

/// Short book representation embedded in borrowing details
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub author: String,
    #[schema(value_type = String)]
    pub daily_fee: Decimal,
}

impl From<&Book> for BookShort {
    fn from(book: &Book) -> Self {
        BookShort {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            daily_fee: book.daily_fee,
        }
    }
}

/// Fees must fit `NUMERIC(10,2)`
const FEE_LIMIT: i64 = 100_000_000;

fn validate_fee(fee: &Decimal) -> Result<(), ValidationError> {
    if fee.is_sign_negative() {
        return Err(ValidationError::new("negative_fee"));
    }
    if *fee >= Decimal::from(FEE_LIMIT) {
        return Err(ValidationError::new("fee_too_large"));
    }
    if fee.normalize().scale() > 2 {
        return Err(ValidationError::new("too_many_decimal_places"));
    }
    Ok(())
}

/// Create (or fully replace) a book
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Author must be 1 to 100 characters"))]
    pub author: String,
    #[validate(custom(function = "validate_fee"))]
    #[schema(value_type = String, example = "2.50")]
    pub daily_fee: Decimal,
    #[validate(range(min = 0, message = "Inventory cannot be negative"))]
    pub inventory: i32,
    #[serde(default)]
    pub cover: CoverType,
}

/// Partial book update
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Author must be 1 to 100 characters"))]
    pub author: Option<String>,
    #[schema(value_type = Option<String>)]
    pub daily_fee: Option<Decimal>,
    #[validate(range(min = 0, message = "Inventory cannot be negative"))]
    pub inventory: Option<i32>,
    pub cover: Option<CoverType>,
}

impl From<CreateBook> for UpdateBook {
    fn from(book: CreateBook) -> Self {
        UpdateBook {
            title: Some(book.title),
            author: Some(book.author),
            daily_fee: Some(book.daily_fee),
            inventory: Some(book.inventory),
            cover: Some(book.cover),
        }
    }
}

impl UpdateBook {
    /// Field validation plus the fee rule, which the derive cannot express for an optional decimal
    pub fn validate_fields(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        if let Some(fee) = self.daily_fee {
            if let Err(e) = validate_fee(&fee) {
                let mut errors = ValidationErrors::new();
                errors.add("daily_fee", e);
                return Err(errors);
            }
        }
        Ok(())
    }

    /// Apply the present fields onto an existing book
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if let Some(fee) = self.daily_fee {
            book.daily_fee = fee;
        }
        if let Some(inventory) = self.inventory {
            book.inventory = inventory;
        }
        if let Some(cover) = self.cover {
            book.cover = cover;
        }
    }
}
