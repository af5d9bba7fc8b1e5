//! Unified error type for the point-of-sale core.
//!
//! Validation failures (empty cart, insufficient cash, bad amounts) are kept apart from
//! collaborator failures (database, HTTP, export) so the register can decide which ones
//! become a user-facing rejection and which ones become a non-fatal notice.

use rust_decimal::Decimal;
use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Input rejected before touching any store
    #[error("Validation error: {message}")]
    Validation {
        /// What was rejected
        message: String,
    },

    /// Product does not exist (or was soft deleted)
    #[error("Product not found: {id}")]
    ProductNotFound {
        /// Product id or name that was looked up
        id: String,
    },

    /// Category does not exist
    #[error("Category not found: {id}")]
    CategoryNotFound {
        /// Category id that was looked up
        id: i64,
    },

    /// Customer does not exist
    #[error("Customer not found: {id}")]
    CustomerNotFound {
        /// Customer id that was looked up
        id: i64,
    },

    /// Transaction does not exist
    #[error("Transaction not found: {id}")]
    TransactionNotFound {
        /// Transaction id that was looked up
        id: String,
    },

    /// Monetary amount is negative or otherwise unusable
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Quantity or stock value is out of range
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: i64,
    },

    /// Product cannot be added because nothing is in stock
    #[error("Product is out of stock: {name}")]
    OutOfStock {
        /// Product name
        name: String,
    },

    /// Checkout attempted with no lines in the cart
    #[error("Cannot check out an empty cart")]
    EmptyCart,

    /// Cash payment does not cover the grand total
    #[error("Insufficient cash: received {received}, due {due}")]
    InsufficientCash {
        /// Cash handed over by the customer
        received: Decimal,
        /// Grand total of the sale
        due: Decimal,
    },

    /// The AI analysis service failed or answered with an unusable payload
    #[error("Analysis service error: {message}")]
    Analysis {
        /// What went wrong
        message: String,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Spreadsheet export error
    #[error("Export error: {0}")]
    Export(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Environment variable missing or not unicode
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Returns true for errors caused by user input rather than by a collaborator.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::InvalidAmount { .. }
                | Self::InvalidQuantity { .. }
                | Self::OutOfStock { .. }
                | Self::EmptyCart
                | Self::InsufficientCash { .. }
                | Self::ProductNotFound { .. }
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
