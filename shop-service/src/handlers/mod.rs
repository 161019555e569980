//! HTTP handlers for shop-service.

pub mod auth;
pub mod health;
pub mod invoices;
pub mod items;
pub mod stats;
