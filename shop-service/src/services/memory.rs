//! In-process store used by tests and by the console when no database is
//! configured. Each collection sits behind its own mutex; no lock is held
//! across an await point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;

use super::store::{InventoryStore, InvoiceStore, OtpStore, ShopStore};
use crate::models::{normalize_unit, Invoice, Item, ItemChanges, OtpCode};

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<Vec<Item>>,
    invoices: Mutex<Vec<Invoice>>,
    otps: Mutex<Vec<OtpCode>>,
    failing_invoice_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent invoice inserts fail with a database error.
    pub fn fail_invoice_inserts(&self, failing: bool) {
        self.failing_invoice_inserts.store(failing, Ordering::SeqCst);
    }
}

fn stock_overflow() -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Stock is too large"))
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::DatabaseError(anyhow::anyhow!("memory store lock poisoned")))
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn insert_item(&self, item: &Item) -> Result<(), AppError> {
        let mut items = lock(&self.items)?;
        if items.iter().any(|i| i.item_name == item.item_name) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Item '{}' already exists",
                item.item_name
            )));
        }
        items.push(item.clone());
        Ok(())
    }

    async fn find_item(&self, id: &ObjectId) -> Result<Option<Item>, AppError> {
        Ok(lock(&self.items)?.iter().find(|i| &i.id == id).cloned())
    }

    async fn find_item_by_name(&self, name: &str) -> Result<Option<Item>, AppError> {
        Ok(lock(&self.items)?
            .iter()
            .find(|i| i.item_name == name)
            .cloned())
    }

    async fn list_items(&self) -> Result<Vec<Item>, AppError> {
        Ok(lock(&self.items)?.clone())
    }

    async fn search_items(&self, term: &str) -> Result<Vec<Item>, AppError> {
        let needle = term.to_lowercase();
        Ok(lock(&self.items)?
            .iter()
            .filter(|i| i.item_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn update_item(
        &self,
        id: &ObjectId,
        changes: &ItemChanges,
    ) -> Result<Option<Item>, AppError> {
        let mut items = lock(&self.items)?;
        let Some(item) = items.iter_mut().find(|i| &i.id == id) else {
            return Ok(None);
        };
        // Resolve the stock first so a rejected change leaves the item as is
        let stock = match changes.stock {
            Some(change) => change.apply(item.stock).ok_or_else(stock_overflow)?,
            None => item.stock,
        };
        if let Some(price) = changes.item_price {
            item.item_price = price;
        }
        item.stock = stock;
        if let Some(unit) = &changes.unit {
            item.unit = unit.clone();
        }
        Ok(Some(item.clone()))
    }

    async fn delete_item(&self, id: &ObjectId) -> Result<bool, AppError> {
        let mut items = lock(&self.items)?;
        let before = items.len();
        items.retain(|i| &i.id != id);
        Ok(items.len() != before)
    }

    async fn take_stock(&self, id: &ObjectId, quantity: i64) -> Result<bool, AppError> {
        let mut items = lock(&self.items)?;
        match items.iter_mut().find(|i| &i.id == id) {
            Some(item) if item.stock >= quantity => {
                item.stock -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restock(&self, id: &ObjectId, quantity: i64) -> Result<(), AppError> {
        if let Some(item) = lock(&self.items)?.iter_mut().find(|i| &i.id == id) {
            item.stock = item.stock.checked_add(quantity).ok_or_else(stock_overflow)?;
        }
        Ok(())
    }

    async fn normalize_units(&self) -> Result<u64, AppError> {
        let mut modified = 0;
        for item in lock(&self.items)?.iter_mut() {
            let unit = normalize_unit(Some(item.unit.clone()));
            if unit != item.unit {
                item.unit = unit;
                modified += 1;
            }
        }
        Ok(modified)
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn next_invoice_id(&self) -> Result<i64, AppError> {
        let invoices = lock(&self.invoices)?;
        Ok(invoices.iter().map(|i| i.invoice_id).max().unwrap_or(0) + 1)
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        if self.failing_invoice_inserts.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!("invoice insert failed")));
        }
        let mut invoices = lock(&self.invoices)?;
        if invoices.iter().any(|i| i.invoice_id == invoice.invoice_id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice {} already exists",
                invoice.invoice_id
            )));
        }
        let mut stored = invoice.clone();
        stored.id.get_or_insert_with(ObjectId::new);
        invoices.push(stored);
        Ok(())
    }

    async fn find_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>, AppError> {
        Ok(lock(&self.invoices)?
            .iter()
            .find(|i| i.invoice_id == invoice_id)
            .cloned())
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, AppError> {
        let mut invoices = lock(&self.invoices)?.clone();
        invoices.sort_by(|a, b| b.invoice_id.cmp(&a.invoice_id));
        Ok(invoices)
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn insert_otp(&self, otp: &OtpCode) -> Result<(), AppError> {
        lock(&self.otps)?.push(otp.clone());
        Ok(())
    }

    async fn find_otp(&self, otp_id: &str) -> Result<Option<OtpCode>, AppError> {
        Ok(lock(&self.otps)?
            .iter()
            .find(|o| o.otp_id == otp_id)
            .cloned())
    }

    async fn count_recent_otps(
        &self,
        destination: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        Ok(lock(&self.otps)?
            .iter()
            .filter(|o| o.destination == destination && o.created_at >= since)
            .count() as u64)
    }

    async fn increment_otp_attempts(&self, otp_id: &str) -> Result<(), AppError> {
        if let Some(otp) = lock(&self.otps)?.iter_mut().find(|o| o.otp_id == otp_id) {
            otp.attempt_count += 1;
        }
        Ok(())
    }

    async fn consume_otp(&self, otp_id: &str) -> Result<bool, AppError> {
        let mut otps = lock(&self.otps)?;
        match otps.iter_mut().find(|o| o.otp_id == otp_id) {
            Some(otp) if otp.consumed_at.is_none() => {
                otp.consumed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ShopStore for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
