pub mod billing;
pub mod database;
pub mod email;
pub mod inventory;
pub mod jwt;
pub mod mailer;
pub mod memory;
pub mod otp;
pub mod pdf;
pub mod reports;
pub mod stock;
pub mod store;
pub mod totals;

pub use billing::{InvoiceLine, InvoiceService, NewInvoice};
pub use database::ShopDb;
pub use email::{EmailAttachment, EmailMessage, EmailProvider, MockEmailProvider, ProviderError, SmtpProvider};
pub use inventory::{parse_object_id, AddedItem, InventoryService, ItemUpdate, NewItem, StockMode};
pub use jwt::{AccessTokenClaims, JwtService, TokenResponse};
pub use mailer::InvoiceMailer;
pub use memory::MemoryStore;
pub use otp::{OtpService, SendOtpResponse};
pub use reports::{CustomerTotal, DailySales, SalesStats};
pub use store::{InventoryStore, InvoiceStore, OtpStore, ShopStore};
pub use totals::{calculate_totals, InvoiceTotals};
