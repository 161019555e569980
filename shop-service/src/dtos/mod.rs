//! Request and response bodies for the HTTP API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail, ValidationError};

use crate::models::{Customer, Invoice, Item, LineItem, MAX_ITEM_PRICE};
use crate::services::{InvoiceLine, ItemUpdate, NewInvoice, NewItem, StockMode};

fn price_in_range(value: &Decimal) -> Result<(), ValidationError> {
    if (value.is_sign_negative() && !value.is_zero()) || *value > MAX_ITEM_PRICE {
        return Err(ValidationError::new("price_range"));
    }
    Ok(())
}

/// Forms send an empty string when no address was entered.
fn email_or_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || value.trim().validate_email() {
        return Ok(());
    }
    Err(ValidationError::new("email"))
}

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 100, message = "Item name is required"))]
    pub item_name: String,

    #[validate(custom(
        function = "price_in_range",
        message = "Price must be between 0 and 1000000000"
    ))]
    pub item_price: Decimal,

    #[validate(range(
        min = 0,
        max = 1_000_000_000,
        message = "Stock must be between 0 and 1000000000"
    ))]
    pub stock: i64,

    #[validate(length(max = 20, message = "Unit is too long"))]
    pub unit: Option<String>,
}

impl From<CreateItemRequest> for NewItem {
    fn from(req: CreateItemRequest) -> Self {
        NewItem {
            item_name: req.item_name,
            item_price: req.item_price,
            stock: req.stock,
            unit: req.unit,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(custom(
        function = "price_in_range",
        message = "Price must be between 0 and 1000000000"
    ))]
    pub item_price: Option<Decimal>,
    #[validate(range(
        min = -1_000_000_000,
        max = 1_000_000_000,
        message = "Stock change is out of range"
    ))]
    pub stock: Option<i64>,
    #[serde(default)]
    pub mode: StockMode,
}

impl From<UpdateItemRequest> for ItemUpdate {
    fn from(req: UpdateItemRequest) -> Self {
        ItemUpdate {
            item_price: req.item_price,
            stock: req.stock,
            mode: req.mode,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub item_name: String,
    pub item_price: Decimal,
    pub stock: i64,
    pub unit: String,
    pub created_at: DateTime<Utc>,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        ItemResponse {
            id: item.id.to_hex(),
            item_name: item.item_name,
            item_price: item.item_price,
            stock: item.stock,
            unit: item.unit,
            created_at: item.created_at,
        }
    }
}

// ============================================================================
// Invoices
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct InvoiceLineRequest {
    #[validate(length(min = 1, message = "Item id is required"))]
    pub item_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, max = 200, message = "Customer name is required"))]
    pub customer_name: String,
    #[serde(default)]
    pub customer_address: String,
    #[serde(default)]
    pub customer_number: String,
    #[validate(custom(function = "email_or_blank", message = "Invalid email format"))]
    pub customer_email: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<InvoiceLineRequest>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount_rate: Decimal,
}

impl From<CreateInvoiceRequest> for NewInvoice {
    fn from(req: CreateInvoiceRequest) -> Self {
        NewInvoice {
            customer: Customer {
                customer_name: req.customer_name,
                customer_address: req.customer_address,
                customer_number: req.customer_number,
                customer_email: req.customer_email.filter(|e| !e.trim().is_empty()),
            },
            lines: req
                .items
                .into_iter()
                .map(|line| InvoiceLine {
                    item_id: line.item_id,
                    quantity: line.quantity,
                })
                .collect(),
            tax_rate: req.tax_rate,
            discount_rate: req.discount_rate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
    pub item_id: String,
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
    pub line_total: Decimal,
}

impl From<LineItem> for LineItemResponse {
    fn from(line: LineItem) -> Self {
        LineItemResponse {
            item_id: line.item_id.to_hex(),
            line_total: line.line_total(),
            name: line.name,
            quantity: line.quantity,
            price: line.price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub invoice_id: i64,
    pub customer_name: String,
    pub customer_address: String,
    pub customer_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub items: Vec<LineItemResponse>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub tax_rate: Decimal,
    pub discount_rate: Decimal,
    pub order_date: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        InvoiceResponse {
            id: invoice.id.map(|id| id.to_hex()),
            invoice_id: invoice.invoice_id,
            customer_name: invoice.customer_name,
            customer_address: invoice.customer_address,
            customer_number: invoice.customer_number,
            customer_email: invoice.customer_email,
            items: invoice.items.into_iter().map(LineItemResponse::from).collect(),
            subtotal: invoice.subtotal,
            tax: invoice.tax,
            discount: invoice.discount,
            total: invoice.total,
            tax_rate: invoice.tax_rate,
            discount_rate: invoice.discount_rate,
            order_date: invoice.order_date,
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1, message = "OTP id is required"))]
    pub otp_id: String,
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}
