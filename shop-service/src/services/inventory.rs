use std::sync::Arc;

use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use super::store::ShopStore;
use crate::error::{ShopError, ShopResult};
use crate::models::{normalize_unit, Item, ItemChanges, StockChange, MAX_ITEM_PRICE, MAX_STOCK};

/// How a stock value in an update is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockMode {
    #[default]
    Set,
    Add,
}

impl std::str::FromStr for StockMode {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "set" => Ok(StockMode::Set),
            "add" => Ok(StockMode::Add),
            other => Err(ShopError::Invalid(format!(
                "Unknown stock mode '{}', expected 'set' or 'add'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub item_name: String,
    pub item_price: Decimal,
    pub stock: i64,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub item_price: Option<Decimal>,
    pub stock: Option<i64>,
    pub mode: StockMode,
}

/// Result of `add_item`: either a fresh item or an existing one restocked.
#[derive(Debug, Clone, PartialEq)]
pub struct AddedItem {
    pub item: Item,
    pub created: bool,
}

pub fn parse_object_id(raw: &str) -> ShopResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| ShopError::InvalidId(raw.to_string()))
}

fn check_price(price: Decimal) -> ShopResult<()> {
    if price < Decimal::ZERO {
        return Err(ShopError::Invalid("Price must not be negative".to_string()));
    }
    if price > MAX_ITEM_PRICE {
        return Err(ShopError::Invalid("Price is too large".to_string()));
    }
    Ok(())
}

fn stock_too_large() -> ShopError {
    ShopError::Invalid("Stock is too large".to_string())
}

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn ShopStore>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn ShopStore>) -> Self {
        Self { store }
    }

    pub async fn list_items(&self) -> ShopResult<Vec<Item>> {
        Ok(self.store.list_items().await?)
    }

    pub async fn search_items(&self, term: &str) -> ShopResult<Vec<Item>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ShopError::Invalid("Search term must not be empty".to_string()));
        }
        Ok(self.store.search_items(term).await?)
    }

    pub async fn get_item(&self, id: &str) -> ShopResult<Item> {
        let oid = parse_object_id(id)?;
        self.store
            .find_item(&oid)
            .await?
            .ok_or_else(|| ShopError::ItemNotFound(id.to_string()))
    }

    /// Insert a new item, or add `stock` to an existing item of the same name
    /// and overwrite its unit. The price of an existing item is kept.
    #[tracing::instrument(skip(self, new), fields(item_name = %new.item_name))]
    pub async fn add_item(&self, new: NewItem) -> ShopResult<AddedItem> {
        let name = new.item_name.trim().to_string();
        if name.is_empty() {
            return Err(ShopError::Invalid("Item name must not be empty".to_string()));
        }
        check_price(new.item_price)?;
        if new.stock < 0 {
            return Err(ShopError::Invalid("Stock must not be negative".to_string()));
        }
        if new.stock > MAX_STOCK {
            return Err(stock_too_large());
        }
        let unit = normalize_unit(new.unit);

        if let Some(existing) = self.store.find_item_by_name(&name).await? {
            return self.restock_existing(&existing, new.stock, unit).await;
        }

        let item = Item::new(name.clone(), new.item_price, new.stock, Some(unit.clone()));
        match self.store.insert_item(&item).await {
            Ok(()) => {
                tracing::info!(item_id = %item.id, "Item added");
                metrics::counter!("shop_items_added_total").increment(1);
                Ok(AddedItem {
                    item,
                    created: true,
                })
            }
            // Another request inserted the same name first
            Err(AppError::Conflict(_)) => {
                let existing = self
                    .store
                    .find_item_by_name(&name)
                    .await?
                    .ok_or_else(|| ShopError::ItemNotFound(name.clone()))?;
                self.restock_existing(&existing, new.stock, unit).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn restock_existing(
        &self,
        existing: &Item,
        stock: i64,
        unit: String,
    ) -> ShopResult<AddedItem> {
        match existing.stock.checked_add(stock) {
            Some(total) if total <= MAX_STOCK => {}
            _ => return Err(stock_too_large()),
        }
        let changes = ItemChanges {
            item_price: None,
            stock: Some(StockChange::Add(stock)),
            unit: Some(unit),
        };
        let item = self
            .store
            .update_item(&existing.id, &changes)
            .await?
            .ok_or_else(|| ShopError::ItemNotFound(existing.item_name.clone()))?;
        tracing::info!(item_id = %item.id, added = stock, stock = item.stock, "Item restocked");
        Ok(AddedItem {
            item,
            created: false,
        })
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_item(&self, id: &str, update: ItemUpdate) -> ShopResult<Item> {
        let oid = parse_object_id(id)?;

        if update.item_price.is_none() && update.stock.is_none() {
            return Err(ShopError::Invalid("Nothing to update".to_string()));
        }
        if let Some(price) = update.item_price {
            check_price(price)?;
        }

        let current = self
            .store
            .find_item(&oid)
            .await?
            .ok_or_else(|| ShopError::ItemNotFound(id.to_string()))?;

        let stock = update.stock.map(|value| match update.mode {
            StockMode::Set => StockChange::Set(value),
            StockMode::Add => StockChange::Add(value),
        });
        if let Some(change) = stock {
            match change.apply(current.stock) {
                Some(next) if next < 0 => {
                    return Err(ShopError::Invalid(format!(
                        "Stock for {} cannot go below zero",
                        current.item_name
                    )));
                }
                Some(next) if next <= MAX_STOCK => {}
                _ => return Err(stock_too_large()),
            }
        }

        let changes = ItemChanges {
            item_price: update.item_price,
            stock,
            unit: None,
        };
        let item = self
            .store
            .update_item(&oid, &changes)
            .await?
            .ok_or_else(|| ShopError::ItemNotFound(id.to_string()))?;

        tracing::info!(item_id = %item.id, stock = item.stock, "Item updated");
        Ok(item)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_item(&self, id: &str) -> ShopResult<()> {
        let oid = parse_object_id(id)?;
        if !self.store.delete_item(&oid).await? {
            return Err(ShopError::ItemNotFound(id.to_string()));
        }
        tracing::info!(item_id = %oid, "Item deleted");
        Ok(())
    }

    /// Startup maintenance for items stored without a usable unit.
    pub async fn normalize_units(&self) -> ShopResult<u64> {
        let modified = self.store.normalize_units().await?;
        if modified > 0 {
            tracing::info!(modified, "Normalized item units");
        }
        Ok(modified)
    }
}
