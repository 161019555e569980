//! Store tests against a live MongoDB (`TEST_MONGODB_URI`).

use std::sync::Arc;

use rust_decimal::Decimal;
use shop_service::config::ShopProfile;
use shop_service::error::ShopError;
use shop_service::models::{Customer, Item};
use shop_service::services::{
    InventoryService, InventoryStore, InvoiceLine, InvoiceService, NewInvoice, ShopDb, ShopStore,
};

async fn connect() -> Arc<ShopDb> {
    let uri = std::env::var("TEST_MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let database = format!("shop_test_{}", uuid::Uuid::new_v4().simple());
    let db = ShopDb::connect(&uri, &database)
        .await
        .expect("Failed to connect to MongoDB");
    db.initialize_indexes().await.expect("Failed to create indexes");
    Arc::new(db)
}

fn order(item: &Item, quantity: i64) -> NewInvoice {
    NewInvoice {
        customer: Customer {
            customer_name: "Ravi".to_string(),
            customer_address: String::new(),
            customer_number: String::new(),
            customer_email: None,
        },
        lines: vec![InvoiceLine {
            item_id: item.id.to_hex(),
            quantity,
        }],
        tax_rate: Decimal::from(5),
        discount_rate: Decimal::from(2),
    }
}

#[tokio::test]
#[ignore] // Requires running MongoDB
async fn invoices_reserve_stock_in_mongodb() {
    let db = connect().await;
    db.health_check().await.expect("MongoDB not healthy");

    let rice = Item::new("Rice".to_string(), Decimal::from(100), 3, None);
    db.insert_item(&rice).await.unwrap();
    let invoices = InvoiceService::new(db.clone(), None, ShopProfile::default());

    let first = invoices.create_invoice(order(&rice, 2)).await.unwrap();
    assert_eq!(first.invoice_id, 1);
    assert_eq!(first.total, Decimal::from(210));

    let err = invoices.create_invoice(order(&rice, 2)).await.unwrap_err();
    assert!(matches!(err, ShopError::InsufficientStock { available: 1, .. }));

    let stored = db.find_item(&rice.id).await.unwrap().unwrap();
    assert_eq!(stored.stock, 1);
    assert_eq!(invoices.list_invoices().await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore] // Requires running MongoDB
async fn search_escapes_regex_in_mongodb() {
    let db = connect().await;
    let inventory = InventoryService::new(db.clone());

    for name in ["Rice (Brown)", "Rice Brown", "Wheat"] {
        db.insert_item(&Item::new(name.to_string(), Decimal::from(10), 1, None))
            .await
            .unwrap();
    }

    let found = inventory.search_items("(brown").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].item_name, "Rice (Brown)");
}
