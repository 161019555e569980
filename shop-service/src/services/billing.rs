//! Invoice creation and lookup.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use super::inventory::parse_object_id;
use super::mailer::InvoiceMailer;
use super::pdf::render_invoice_pdf;
use super::stock::{release_stock, reserve_stock, reserved_quantities, StockRequest};
use super::store::ShopStore;
use super::totals::{calculate_totals, validate_rate};
use crate::config::ShopProfile;
use crate::error::{ShopError, ShopResult};
use crate::models::{Customer, Invoice};

/// A requested invoice line before the item is looked up.
#[derive(Debug, Clone)]
pub struct InvoiceLine {
    pub item_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub customer: Customer,
    pub lines: Vec<InvoiceLine>,
    pub tax_rate: Decimal,
    pub discount_rate: Decimal,
}

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn ShopStore>,
    mailer: Option<InvoiceMailer>,
    shop: ShopProfile,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn ShopStore>, mailer: Option<InvoiceMailer>, shop: ShopProfile) -> Self {
        Self { store, mailer, shop }
    }

    pub fn shop(&self) -> &ShopProfile {
        &self.shop
    }

    /// Validate, reserve stock, price, number and store a new invoice, then
    /// queue the confirmation email. Stock is untouched when any step before
    /// the reservation fails, and given back when the insert fails.
    #[tracing::instrument(skip(self, new), fields(customer = %new.customer.customer_name))]
    pub async fn create_invoice(&self, new: NewInvoice) -> ShopResult<Invoice> {
        let customer_name = new.customer.customer_name.trim().to_string();
        if customer_name.is_empty() {
            return Err(ShopError::Invalid("Customer name must not be empty".to_string()));
        }
        if new.lines.is_empty() {
            return Err(ShopError::EmptyInvoice);
        }
        let tax_rate = validate_rate("Tax rate", new.tax_rate)?;
        let discount_rate = validate_rate("Discount rate", new.discount_rate)?;

        let mut requests = Vec::with_capacity(new.lines.len());
        for line in &new.lines {
            let quantity = u32::try_from(line.quantity)
                .ok()
                .filter(|q| *q > 0)
                .ok_or_else(|| ShopError::InvalidQuantity(line.item_id.clone()))?;
            requests.push(StockRequest {
                item_id: parse_object_id(&line.item_id)?,
                quantity,
            });
        }

        let items = reserve_stock(self.store.as_ref(), &requests).await?;
        let totals = match calculate_totals(&items, tax_rate, discount_rate) {
            Ok(totals) => totals,
            Err(e) => {
                release_stock(self.store.as_ref(), &reserved_quantities(&items)).await;
                return Err(e);
            }
        };

        let invoice_id = match self.store.next_invoice_id().await {
            Ok(id) => id,
            Err(e) => {
                release_stock(self.store.as_ref(), &reserved_quantities(&items)).await;
                return Err(e.into());
            }
        };

        let now = Utc::now();
        let customer_email = new
            .customer
            .customer_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        let invoice = Invoice {
            id: None,
            invoice_id,
            customer_name,
            customer_address: new.customer.customer_address,
            customer_number: new.customer.customer_number,
            customer_email,
            items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            discount: totals.discount,
            total: totals.total,
            tax_rate,
            discount_rate,
            order_date: now,
            created_at: now,
        };

        if let Err(e) = self.store.insert_invoice(&invoice).await {
            tracing::warn!(invoice_id, "Invoice insert failed, releasing reserved stock");
            release_stock(self.store.as_ref(), &reserved_quantities(&invoice.items)).await;
            return Err(e.into());
        }

        tracing::info!(invoice_id, total = %invoice.total, "Invoice created");
        metrics::counter!("shop_invoices_created_total").increment(1);

        if let (Some(mailer), Some(to)) = (&self.mailer, &invoice.customer_email) {
            mailer.enqueue(to.clone(), invoice.clone());
        }

        Ok(invoice)
    }

    pub async fn get_invoice(&self, invoice_id: i64) -> ShopResult<Invoice> {
        self.store
            .find_invoice(invoice_id)
            .await?
            .ok_or(ShopError::InvoiceNotFound(invoice_id))
    }

    /// Highest invoice id first.
    pub async fn list_invoices(&self) -> ShopResult<Vec<Invoice>> {
        Ok(self.store.list_invoices().await?)
    }

    pub async fn invoice_pdf(&self, invoice_id: i64) -> ShopResult<Vec<u8>> {
        let invoice = self.get_invoice(invoice_id).await?;
        render_invoice_pdf(&invoice, &self.shop)
    }
}
