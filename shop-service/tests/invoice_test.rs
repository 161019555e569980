mod common;

use axum::http::StatusCode;
use common::{decimal, TestApp};
use rust_decimal::Decimal;
use serde_json::json;

async fn stock_of(app: &TestApp, id: &str) -> i64 {
    let items = app.get("/api/items").await.json();
    items["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["_id"] == id)
        .and_then(|i| i["stock"].as_i64())
        .expect("Item missing")
}

#[tokio::test]
async fn create_invoice_computes_totals_and_decrements_stock() {
    let app = TestApp::new();
    let rice = app.add_item("Rice", "100", 10).await;

    let response = app
        .post(
            "/api/invoices",
            json!({
                "customer_name": "Meena Shah",
                "customer_address": "12 Market St",
                "customer_number": "9876543210",
                "items": [{ "item_id": rice, "quantity": 2 }],
                "tax_rate": 5,
                "discount_rate": 2
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let body = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["invoice_id"], 1);

    let invoice = &body["invoice"];
    assert_eq!(decimal(&invoice["subtotal"]), Decimal::from(200));
    assert_eq!(decimal(&invoice["tax"]), Decimal::from(10));
    assert_eq!(decimal(&invoice["discount"]), Decimal::from(4));
    assert_eq!(decimal(&invoice["total"]), Decimal::from(210));
    assert_eq!(invoice["items"][0]["name"], "Rice");
    assert_eq!(invoice["items"][0]["quantity"], 2);

    assert_eq!(stock_of(&app, &rice).await, 8);
}

#[tokio::test]
async fn invoice_ids_are_sequential_and_listed_newest_first() {
    let app = TestApp::new();
    let dal = app.add_item("Dal", "120", 10).await;

    for name in ["Ravi", "Asha", "Ravi"] {
        let response = app
            .post(
                "/api/invoices",
                json!({ "customer_name": name, "items": [{ "item_id": dal, "quantity": 1 }] }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let body = app.get("/api/invoices").await.json();
    let ids: Vec<i64> = body["invoices"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|i| i["invoice_id"].as_i64())
        .collect();
    assert_eq!(ids, vec![3, 2, 1]);

    let second = app.get("/api/invoices/2").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.json()["invoice"]["customer_name"], "Asha");
}

#[tokio::test]
async fn insufficient_stock_leaves_inventory_untouched() {
    let app = TestApp::new();
    let rice = app.add_item("Rice", "100", 10).await;
    let oil = app.add_item("Oil", "150", 1).await;

    let response = app
        .post(
            "/api/invoices",
            json!({
                "customer_name": "Ravi",
                "items": [
                    { "item_id": rice, "quantity": 3 },
                    { "item_id": oil, "quantity": 2 }
                ]
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json();
    assert!(body["error"].as_str().unwrap().contains("Available: 1"));

    assert_eq!(stock_of(&app, &rice).await, 10);
    assert_eq!(stock_of(&app, &oil).await, 1);
    assert!(app.get("/api/invoices").await.json()["invoices"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn invalid_invoice_requests_are_rejected() {
    let app = TestApp::new();
    let rice = app.add_item("Rice", "100", 10).await;

    let cases = [
        json!({ "customer_name": "Ravi", "items": [] }),
        json!({ "customer_name": "Ravi", "items": [{ "item_id": rice, "quantity": 0 }] }),
        json!({ "customer_name": "Ravi", "items": [{ "item_id": "xyz", "quantity": 1 }] }),
        json!({ "customer_name": "Ravi", "items": [{ "item_id": rice, "quantity": 1 }], "tax_rate": 101 }),
        json!({ "customer_name": "Ravi", "items": [{ "item_id": rice, "quantity": 1 }], "discount_rate": -1 }),
    ];

    for body in cases {
        let response = app.post("/api/invoices", body.clone()).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "request: {}", body);
    }

    assert_eq!(stock_of(&app, &rice).await, 10);
}

#[tokio::test]
async fn unknown_invoice_is_not_found() {
    let app = TestApp::new();

    assert_eq!(app.get("/api/invoices/42").await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/invoices/42/pdf").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invoice_pdf_download() {
    let app = TestApp::new();
    let rice = app.add_item("Rice", "100", 10).await;
    app.post(
        "/api/invoices",
        json!({ "customer_name": "Ravi", "items": [{ "item_id": rice, "quantity": 1 }] }),
    )
    .await;

    let response = app.get("/api/invoices/1/pdf").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers["content-type"], "application/pdf");
    assert_eq!(
        response.headers["content-disposition"],
        "attachment; filename=\"invoice_1.pdf\""
    );
    assert!(response.bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn stats_summarize_invoices() {
    let app = TestApp::new();
    let rice = app.add_item("Rice", "100", 20).await;

    for (name, quantity) in [("Ravi", 1), ("Asha", 3), ("Ravi", 1)] {
        app.post(
            "/api/invoices",
            json!({ "customer_name": name, "items": [{ "item_id": rice, "quantity": quantity }] }),
        )
        .await;
    }

    let response = app.get("/api/stats").await;

    assert_eq!(response.status, StatusCode::OK);
    let stats = &response.json()["stats"];
    assert_eq!(stats["total_invoices"], 3);
    assert_eq!(decimal(&stats["total_revenue"]), Decimal::from(500));
    assert_eq!(stats["top_customers"][0]["customer_name"], "Asha");
    assert_eq!(stats["top_customers"][1]["customer_name"], "Ravi");
    assert_eq!(stats["top_customers"][1]["invoice_count"], 2);
    assert_eq!(stats["daily_sales"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn customer_with_email_is_mailed_the_invoice() {
    let app = TestApp::with_mailer();
    let rice = app.add_item("Rice", "100", 10).await;

    let response = app
        .post(
            "/api/invoices",
            json!({
                "customer_name": "Meena Shah",
                "customer_email": "meena@example.com",
                "items": [{ "item_id": rice, "quantity": 1 }]
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let email = app.drain_mail().await;
    let mail = email
        .last_sent_to("meena@example.com")
        .expect("Invoice email not sent");
    assert_eq!(mail.subject, "Your Invoice #1");
    assert_eq!(mail.attachments.len(), 1);
    assert_eq!(mail.attachments[0].filename, "invoice_1.pdf");
    assert!(mail.attachments[0].data.starts_with(b"%PDF"));
}

#[tokio::test]
async fn failed_invoice_email_does_not_affect_invoice() {
    let app = TestApp::with_mailer();
    app.email.fail_sends(true);
    let rice = app.add_item("Rice", "100", 10).await;

    let response = app
        .post(
            "/api/invoices",
            json!({
                "customer_name": "Meena Shah",
                "customer_email": "meena@example.com",
                "items": [{ "item_id": rice, "quantity": 1 }]
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json()["invoice_id"], 1);

    let stored = app.get("/api/invoices/1").await;
    assert_eq!(stored.status, StatusCode::OK);
    assert_eq!(stock_of(&app, &rice).await, 9);

    let email = app.drain_mail().await;
    assert_eq!(email.send_count(), 0);
    assert!(email.last_sent_to("meena@example.com").is_none());
}

#[tokio::test]
async fn customer_without_email_is_not_mailed() {
    let app = TestApp::with_mailer();
    let rice = app.add_item("Rice", "100", 10).await;
    app.post(
        "/api/invoices",
        json!({ "customer_name": "Ravi", "customer_email": "", "items": [{ "item_id": rice, "quantity": 1 }] }),
    )
    .await;

    let email = app.drain_mail().await;
    assert_eq!(email.send_count(), 0);
}
