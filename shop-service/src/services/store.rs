//! Storage seams.
//!
//! Services depend on these traits rather than on a concrete database so the
//! same code runs against MongoDB in production and [`MemoryStore`] in tests
//! and offline console sessions.
//!
//! [`MemoryStore`]: super::MemoryStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;

use crate::models::{Invoice, Item, ItemChanges, OtpCode};

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn insert_item(&self, item: &Item) -> Result<(), AppError>;

    async fn find_item(&self, id: &ObjectId) -> Result<Option<Item>, AppError>;

    async fn find_item_by_name(&self, name: &str) -> Result<Option<Item>, AppError>;

    async fn list_items(&self) -> Result<Vec<Item>, AppError>;

    /// Case-insensitive substring match on the item name. `term` is literal.
    async fn search_items(&self, term: &str) -> Result<Vec<Item>, AppError>;

    /// Apply `changes` and return the updated item, or `None` if absent.
    async fn update_item(
        &self,
        id: &ObjectId,
        changes: &ItemChanges,
    ) -> Result<Option<Item>, AppError>;

    /// Returns `false` when nothing was deleted.
    async fn delete_item(&self, id: &ObjectId) -> Result<bool, AppError>;

    /// Decrement stock only if at least `quantity` is available.
    /// Returns `false` (and changes nothing) otherwise.
    async fn take_stock(&self, id: &ObjectId, quantity: i64) -> Result<bool, AppError>;

    /// Unconditionally add `quantity` back to stock.
    async fn restock(&self, id: &ObjectId, quantity: i64) -> Result<(), AppError>;

    /// Replace missing, empty and "N/A" units with the default unit.
    /// Returns the number of modified items.
    async fn normalize_units(&self) -> Result<u64, AppError>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Highest stored invoice id plus one, or 1 for an empty store.
    async fn next_invoice_id(&self) -> Result<i64, AppError>;

    /// Fails with `Conflict` when the invoice id is already taken.
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;

    async fn find_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>, AppError>;

    /// All invoices, highest id first.
    async fn list_invoices(&self) -> Result<Vec<Invoice>, AppError>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert_otp(&self, otp: &OtpCode) -> Result<(), AppError>;

    async fn find_otp(&self, otp_id: &str) -> Result<Option<OtpCode>, AppError>;

    /// Codes issued to `destination` at or after `since`.
    async fn count_recent_otps(
        &self,
        destination: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    async fn increment_otp_attempts(&self, otp_id: &str) -> Result<(), AppError>;

    /// Mark consumed. Returns `false` if it was already consumed.
    async fn consume_otp(&self, otp_id: &str) -> Result<bool, AppError>;
}

/// Everything the shop needs from a backend.
#[async_trait]
pub trait ShopStore: InventoryStore + InvoiceStore + OtpStore {
    async fn health_check(&self) -> Result<(), AppError>;
}
