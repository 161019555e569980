use std::io;
use std::path::PathBuf;

use service_core::observability::init_console_tracing;
use shop_service::config::ShopConfig;
use shop_service::console::Console;
use shop_service::services::{InventoryService, InvoiceMailer, InvoiceService};
use shop_service::startup::{connect_store, email_provider};

#[tokio::main]
async fn main() -> io::Result<()> {
    let config = ShopConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_console_tracing(&config.common.log_level);

    let store = connect_store(&config).await.map_err(|e| {
        eprintln!("Failed to open the shop database: {}", e);
        io::Error::other(format!("Startup error: {}", e))
    })?;

    let inventory = InventoryService::new(store.clone());
    if let Err(e) = inventory.normalize_units().await {
        tracing::warn!("Unit normalization failed: {}", e);
    }

    let invoice_dir = PathBuf::from(&config.console.invoice_dir);
    std::fs::create_dir_all(&invoice_dir)?;

    let (mailer, mailer_worker) = InvoiceMailer::start(
        email_provider(&config),
        config.shop.clone(),
        config.mailer.queue_capacity,
    );
    let invoices = InvoiceService::new(store, Some(mailer), config.shop.clone());

    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout(), inventory, invoices, invoice_dir);
    let result = console.run().await;

    // Last mailer handle goes with the console; the worker then drains
    drop(console);
    if let Err(e) = mailer_worker.await {
        tracing::error!("Invoice mailer task failed: {}", e);
    }

    result
}
