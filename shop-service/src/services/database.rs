use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOneOptions, FindOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

use super::store::{InventoryStore, InvoiceStore, OtpStore, ShopStore};
use crate::models::{Invoice, Item, ItemChanges, OtpCode, StockChange, DEFAULT_UNIT};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct ShopDb {
    client: MongoClient,
    db: Database,
}

fn db_error(context: &str, e: mongodb::error::Error) -> AppError {
    tracing::error!("{}: {}", context, e);
    AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY
    )
}

impl ShopDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for shop-service");

        // Item name is the natural key used by add-or-restock
        let item_name_index = IndexModel::builder()
            .keys(doc! { "item_name": 1 })
            .options(
                IndexOptions::builder()
                    .name("item_name_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.items()
            .create_index(item_name_index, None)
            .await
            .map_err(|e| db_error("Failed to create item_name index", e))?;

        // Unique invoice_id turns a concurrent id collision into a conflict
        let invoice_id_index = IndexModel::builder()
            .keys(doc! { "invoice_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_id_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.invoices()
            .create_index(invoice_id_index, None)
            .await
            .map_err(|e| db_error("Failed to create invoice_id index", e))?;

        let customer_index = IndexModel::builder()
            .keys(doc! { "customer_name": 1 })
            .options(
                IndexOptions::builder()
                    .name("customer_name_idx".to_string())
                    .build(),
            )
            .build();

        self.invoices()
            .create_index(customer_index, None)
            .await
            .map_err(|e| db_error("Failed to create customer_name index", e))?;

        let otp_id_index = IndexModel::builder()
            .keys(doc! { "otp_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("otp_id_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.otp_codes()
            .create_index(otp_id_index, None)
            .await
            .map_err(|e| db_error("Failed to create otp_id index", e))?;

        // Supports the per-destination send rate check
        let otp_destination_index = IndexModel::builder()
            .keys(doc! { "destination": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("otp_destination_created_idx".to_string())
                    .build(),
            )
            .build();

        self.otp_codes()
            .create_index(otp_destination_index, None)
            .await
            .map_err(|e| db_error("Failed to create otp destination index", e))?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub fn items(&self) -> Collection<Item> {
        self.db.collection("items")
    }

    pub fn invoices(&self) -> Collection<Invoice> {
        self.db.collection("invoices")
    }

    pub fn otp_codes(&self) -> Collection<OtpCode> {
        self.db.collection("otp_codes")
    }
}

/// `$set` / `$inc` document for an item update. `None` when nothing changes.
fn item_update(changes: &ItemChanges) -> Option<Document> {
    let mut set = Document::new();
    let mut inc = Document::new();

    if let Some(price) = changes.item_price {
        set.insert("item_price", price.to_string());
    }
    match changes.stock {
        Some(StockChange::Set(value)) => {
            set.insert("stock", value);
        }
        Some(StockChange::Add(delta)) => {
            inc.insert("stock", delta);
        }
        None => {}
    }
    if let Some(unit) = &changes.unit {
        set.insert("unit", unit.as_str());
    }

    let mut update = Document::new();
    if !set.is_empty() {
        update.insert("$set", set);
    }
    if !inc.is_empty() {
        update.insert("$inc", inc);
    }
    (!update.is_empty()).then_some(update)
}

#[async_trait]
impl InventoryStore for ShopDb {
    async fn insert_item(&self, item: &Item) -> Result<(), AppError> {
        self.items().insert_one(item, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict(anyhow::anyhow!("Item '{}' already exists", item.item_name))
            } else {
                db_error("Failed to insert item", e)
            }
        })?;
        Ok(())
    }

    async fn find_item(&self, id: &ObjectId) -> Result<Option<Item>, AppError> {
        self.items()
            .find_one(doc! { "_id": *id }, None)
            .await
            .map_err(|e| db_error("Failed to find item", e))
    }

    async fn find_item_by_name(&self, name: &str) -> Result<Option<Item>, AppError> {
        self.items()
            .find_one(doc! { "item_name": name }, None)
            .await
            .map_err(|e| db_error("Failed to find item by name", e))
    }

    async fn list_items(&self) -> Result<Vec<Item>, AppError> {
        let cursor = self
            .items()
            .find(doc! {}, None)
            .await
            .map_err(|e| db_error("Failed to list items", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| db_error("Failed to collect items", e))
    }

    async fn search_items(&self, term: &str) -> Result<Vec<Item>, AppError> {
        let filter = doc! {
            "item_name": { "$regex": regex::escape(term), "$options": "i" }
        };

        let cursor = self
            .items()
            .find(filter, None)
            .await
            .map_err(|e| db_error("Failed to search items", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| db_error("Failed to collect search results", e))
    }

    async fn update_item(
        &self,
        id: &ObjectId,
        changes: &ItemChanges,
    ) -> Result<Option<Item>, AppError> {
        let Some(update) = item_update(changes) else {
            return self.find_item(id).await;
        };

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.items()
            .find_one_and_update(doc! { "_id": *id }, update, options)
            .await
            .map_err(|e| db_error("Failed to update item", e))
    }

    async fn delete_item(&self, id: &ObjectId) -> Result<bool, AppError> {
        let result = self
            .items()
            .delete_one(doc! { "_id": *id }, None)
            .await
            .map_err(|e| db_error("Failed to delete item", e))?;
        Ok(result.deleted_count > 0)
    }

    async fn take_stock(&self, id: &ObjectId, quantity: i64) -> Result<bool, AppError> {
        let result = self
            .items()
            .update_one(
                doc! { "_id": *id, "stock": { "$gte": quantity } },
                doc! { "$inc": { "stock": -quantity } },
                None,
            )
            .await
            .map_err(|e| db_error("Failed to decrement stock", e))?;
        Ok(result.modified_count == 1)
    }

    async fn restock(&self, id: &ObjectId, quantity: i64) -> Result<(), AppError> {
        self.items()
            .update_one(
                doc! { "_id": *id },
                doc! { "$inc": { "stock": quantity } },
                None,
            )
            .await
            .map_err(|e| db_error("Failed to restock item", e))?;
        Ok(())
    }

    async fn normalize_units(&self) -> Result<u64, AppError> {
        let filter = doc! {
            "$or": [
                { "unit": { "$exists": false } },
                { "unit": null },
                { "unit": "" },
                { "unit": "N/A" }
            ]
        };

        let result = self
            .items()
            .update_many(filter, doc! { "$set": { "unit": DEFAULT_UNIT } }, None)
            .await
            .map_err(|e| db_error("Failed to normalize item units", e))?;
        Ok(result.modified_count)
    }
}

#[async_trait]
impl InvoiceStore for ShopDb {
    async fn next_invoice_id(&self) -> Result<i64, AppError> {
        let options = FindOneOptions::builder()
            .sort(doc! { "invoice_id": -1 })
            .build();

        let last = self
            .invoices()
            .find_one(doc! {}, options)
            .await
            .map_err(|e| db_error("Failed to read last invoice", e))?;

        Ok(last.map_or(1, |invoice| invoice.invoice_id + 1))
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        self.invoices()
            .insert_one(invoice, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Conflict(anyhow::anyhow!(
                        "Invoice {} already exists",
                        invoice.invoice_id
                    ))
                } else {
                    db_error("Failed to insert invoice", e)
                }
            })?;
        Ok(())
    }

    async fn find_invoice(&self, invoice_id: i64) -> Result<Option<Invoice>, AppError> {
        self.invoices()
            .find_one(doc! { "invoice_id": invoice_id }, None)
            .await
            .map_err(|e| db_error("Failed to find invoice", e))
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "invoice_id": -1 })
            .build();

        let cursor = self
            .invoices()
            .find(doc! {}, options)
            .await
            .map_err(|e| db_error("Failed to list invoices", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| db_error("Failed to collect invoices", e))
    }
}

#[async_trait]
impl OtpStore for ShopDb {
    async fn insert_otp(&self, otp: &OtpCode) -> Result<(), AppError> {
        self.otp_codes()
            .insert_one(otp, None)
            .await
            .map_err(|e| db_error("Failed to insert OTP", e))?;
        Ok(())
    }

    async fn find_otp(&self, otp_id: &str) -> Result<Option<OtpCode>, AppError> {
        self.otp_codes()
            .find_one(doc! { "otp_id": otp_id }, None)
            .await
            .map_err(|e| db_error("Failed to find OTP", e))
    }

    async fn count_recent_otps(
        &self,
        destination: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        self.otp_codes()
            .count_documents(
                doc! {
                    "destination": destination,
                    "created_at": { "$gte": BsonDateTime::from_chrono(since) }
                },
                None,
            )
            .await
            .map_err(|e| db_error("Failed to count recent OTPs", e))
    }

    async fn increment_otp_attempts(&self, otp_id: &str) -> Result<(), AppError> {
        self.otp_codes()
            .update_one(
                doc! { "otp_id": otp_id },
                doc! { "$inc": { "attempt_count": 1 } },
                None,
            )
            .await
            .map_err(|e| db_error("Failed to increment OTP attempts", e))?;
        Ok(())
    }

    async fn consume_otp(&self, otp_id: &str) -> Result<bool, AppError> {
        let result = self
            .otp_codes()
            .update_one(
                doc! { "otp_id": otp_id, "consumed_at": { "$exists": false } },
                doc! { "$set": { "consumed_at": BsonDateTime::now() } },
                None,
            )
            .await
            .map_err(|e| db_error("Failed to consume OTP", e))?;
        Ok(result.modified_count == 1)
    }
}

#[async_trait]
impl ShopStore for ShopDb {
    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| db_error("MongoDB health check failed", e))?;
        Ok(())
    }
}
