//! Domain errors for shop operations.

use rust_decimal::Decimal;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopError {
    #[error("Not enough stock for {item}. Available: {available}")]
    InsufficientStock { item: String, available: i64 },

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(i64),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("{name} must be between 0 and 100, got {value}")]
    InvalidRate { name: &'static str, value: Decimal },

    #[error("Quantity for item {0} must be greater than zero")]
    InvalidQuantity(String),

    #[error("No items provided")]
    EmptyInvoice,

    #[error("{0}")]
    Invalid(String),

    #[error("PDF rendering failed: {0}")]
    Pdf(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

pub type ShopResult<T> = Result<T, ShopError>;

impl From<ShopError> for AppError {
    fn from(err: ShopError) -> Self {
        match err {
            ShopError::ItemNotFound(_) | ShopError::InvoiceNotFound(_) => {
                AppError::NotFound(anyhow::anyhow!(err.to_string()))
            }
            ShopError::InsufficientStock { .. }
            | ShopError::InvalidId(_)
            | ShopError::InvalidRate { .. }
            | ShopError::InvalidQuantity(_)
            | ShopError::EmptyInvoice
            | ShopError::Invalid(_) => AppError::BadRequest(anyhow::anyhow!(err.to_string())),
            ShopError::Pdf(msg) => AppError::InternalError(anyhow::anyhow!(msg)),
            ShopError::Store(inner) => inner,
        }
    }
}
