//! All-or-nothing stock reservation for invoice lines.

use std::collections::HashMap;

use mongodb::bson::oid::ObjectId;

use super::store::InventoryStore;
use crate::error::{ShopError, ShopResult};
use crate::models::{Item, LineItem};

/// One requested line: which item and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockRequest {
    pub item_id: ObjectId,
    pub quantity: u32,
}

/// Check every request against current stock and, only if all of them fit,
/// decrement. Repeated item ids are checked against their combined quantity.
///
/// Returns the line items in request order with the name and price each
/// item had at check time.
pub async fn reserve_stock<S>(store: &S, requests: &[StockRequest]) -> ShopResult<Vec<LineItem>>
where
    S: InventoryStore + ?Sized,
{
    let mut demand: Vec<(ObjectId, i64)> = Vec::new();
    for request in requests {
        if request.quantity == 0 {
            return Err(ShopError::InvalidQuantity(request.item_id.to_hex()));
        }
        let quantity = i64::from(request.quantity);
        match demand.iter_mut().find(|(id, _)| *id == request.item_id) {
            Some((_, total)) => {
                *total = total
                    .checked_add(quantity)
                    .ok_or_else(|| ShopError::InvalidQuantity(request.item_id.to_hex()))?;
            }
            None => demand.push((request.item_id, quantity)),
        }
    }

    let mut snapshot: HashMap<ObjectId, Item> = HashMap::with_capacity(demand.len());
    for (id, quantity) in &demand {
        let item = store
            .find_item(id)
            .await?
            .ok_or_else(|| ShopError::ItemNotFound(id.to_hex()))?;
        if item.stock < *quantity {
            return Err(ShopError::InsufficientStock {
                item: item.item_name,
                available: item.stock,
            });
        }
        snapshot.insert(*id, item);
    }

    let mut taken: Vec<(ObjectId, i64)> = Vec::with_capacity(demand.len());
    for (id, quantity) in &demand {
        let outcome = store.take_stock(id, *quantity).await;
        match outcome {
            Ok(true) => taken.push((*id, *quantity)),
            Ok(false) => {
                release_stock(store, &taken).await;
                // Someone else sold it between the check and the decrement.
                let current = store.find_item(id).await?;
                let (item, available) = match current {
                    Some(item) => (item.item_name, item.stock),
                    None => (snapshot[id].item_name.clone(), 0),
                };
                return Err(ShopError::InsufficientStock { item, available });
            }
            Err(e) => {
                release_stock(store, &taken).await;
                return Err(e.into());
            }
        }
    }

    tracing::debug!(items = demand.len(), "Stock reserved");

    Ok(requests
        .iter()
        .map(|request| {
            let item = &snapshot[&request.item_id];
            LineItem {
                item_id: request.item_id,
                name: item.item_name.clone(),
                quantity: request.quantity,
                price: item.item_price,
            }
        })
        .collect())
}

/// Give reserved quantities back. Failures are logged; the caller already
/// has an error to report.
pub async fn release_stock<S>(store: &S, reserved: &[(ObjectId, i64)])
where
    S: InventoryStore + ?Sized,
{
    for (id, quantity) in reserved {
        if let Err(e) = store.restock(id, *quantity).await {
            tracing::error!(item_id = %id, quantity, "Failed to release reserved stock: {}", e);
        }
    }
}

/// Quantities per item for a set of line items, as `release_stock` expects.
pub fn reserved_quantities(lines: &[LineItem]) -> Vec<(ObjectId, i64)> {
    let mut reserved: Vec<(ObjectId, i64)> = Vec::new();
    for line in lines {
        match reserved.iter_mut().find(|(id, _)| *id == line.item_id) {
            // Never exceeds the demand that was checked when reserving
            Some((_, total)) => *total = total.saturating_add(i64::from(line.quantity)),
            None => reserved.push((line.item_id, i64::from(line.quantity))),
        }
    }
    reserved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;
    use rust_decimal::Decimal;

    async fn stocked(store: &MemoryStore, name: &str, price: i64, stock: i64) -> ObjectId {
        let item = Item::new(name.into(), Decimal::from(price), stock, None);
        store.insert_item(&item).await.unwrap();
        item.id
    }

    async fn stock_of(store: &MemoryStore, id: &ObjectId) -> i64 {
        store.find_item(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn reserves_and_captures_name_and_price() {
        let store = MemoryStore::new();
        let rice = stocked(&store, "Rice", 60, 10).await;
        let dal = stocked(&store, "Dal", 120, 4).await;

        let lines = reserve_stock(
            &store,
            &[
                StockRequest { item_id: rice, quantity: 2 },
                StockRequest { item_id: dal, quantity: 4 },
            ],
        )
        .await
        .unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "Rice");
        assert_eq!(lines[0].price, Decimal::from(60));
        assert_eq!(lines[1].quantity, 4);
        assert_eq!(stock_of(&store, &rice).await, 8);
        assert_eq!(stock_of(&store, &dal).await, 0);
    }

    #[tokio::test]
    async fn failing_check_leaves_every_item_untouched() {
        let store = MemoryStore::new();
        let rice = stocked(&store, "Rice", 60, 10).await;
        let dal = stocked(&store, "Dal", 120, 1).await;

        let err = reserve_stock(
            &store,
            &[
                StockRequest { item_id: rice, quantity: 2 },
                StockRequest { item_id: dal, quantity: 3 },
            ],
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Not enough stock for Dal. Available: 1");
        assert_eq!(stock_of(&store, &rice).await, 10);
        assert_eq!(stock_of(&store, &dal).await, 1);
    }

    #[tokio::test]
    async fn repeated_item_is_checked_against_combined_quantity() {
        let store = MemoryStore::new();
        let oil = stocked(&store, "Oil", 150, 5).await;

        let err = reserve_stock(
            &store,
            &[
                StockRequest { item_id: oil, quantity: 3 },
                StockRequest { item_id: oil, quantity: 3 },
            ],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ShopError::InsufficientStock { available: 5, .. }));
        assert_eq!(stock_of(&store, &oil).await, 5);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let store = MemoryStore::new();
        let rice = stocked(&store, "Rice", 60, 10).await;

        let err = reserve_stock(
            &store,
            &[
                StockRequest { item_id: rice, quantity: 1 },
                StockRequest { item_id: ObjectId::new(), quantity: 1 },
            ],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ShopError::ItemNotFound(_)));
        assert_eq!(stock_of(&store, &rice).await, 10);
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let store = MemoryStore::new();
        let rice = stocked(&store, "Rice", 60, 10).await;

        let err = reserve_stock(&store, &[StockRequest { item_id: rice, quantity: 0 }])
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::InvalidQuantity(_)));
    }

    #[tokio::test]
    async fn release_returns_reserved_quantities() {
        let store = MemoryStore::new();
        let rice = stocked(&store, "Rice", 60, 10).await;
        let lines = reserve_stock(
            &store,
            &[
                StockRequest { item_id: rice, quantity: 2 },
                StockRequest { item_id: rice, quantity: 1 },
            ],
        )
        .await
        .unwrap();
        assert_eq!(stock_of(&store, &rice).await, 7);

        release_stock(&store, &reserved_quantities(&lines)).await;
        assert_eq!(stock_of(&store, &rice).await, 10);
    }
}
