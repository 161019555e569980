use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unit label used when none is given or a stored one is unusable.
pub const DEFAULT_UNIT: &str = "pcs";

/// Highest unit price an item may carry (one billion).
pub const MAX_ITEM_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Highest stock count an item may hold.
pub const MAX_STOCK: i64 = 1_000_000_000;

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

/// A sellable inventory item. `item_name` is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub item_name: String,
    pub item_price: Decimal,
    pub stock: i64,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn new(item_name: String, item_price: Decimal, stock: i64, unit: Option<String>) -> Self {
        Self {
            id: ObjectId::new(),
            item_name,
            item_price,
            stock,
            unit: normalize_unit(unit),
            created_at: Utc::now(),
        }
    }
}

/// Empty and "N/A" units fall back to [`DEFAULT_UNIT`].
pub fn normalize_unit(unit: Option<String>) -> String {
    match unit {
        Some(u) if !u.trim().is_empty() && u.trim() != "N/A" => u.trim().to_string(),
        _ => default_unit(),
    }
}

/// How a stock update is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    /// Overwrite the counter.
    Set(i64),
    /// Increment the counter (restock).
    Add(i64),
}

impl StockChange {
    /// New stock level, or `None` when adding would overflow.
    pub fn apply(&self, current: i64) -> Option<i64> {
        match self {
            StockChange::Set(value) => Some(*value),
            StockChange::Add(delta) => current.checked_add(*delta),
        }
    }
}

/// Field changes for an existing item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemChanges {
    pub item_price: Option<Decimal>,
    pub stock: Option<StockChange>,
    pub unit: Option<String>,
}

impl ItemChanges {
    pub fn is_empty(&self) -> bool {
        self.item_price.is_none() && self.stock.is_none() && self.unit.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_falls_back_to_pieces() {
        assert_eq!(normalize_unit(None), "pcs");
        assert_eq!(normalize_unit(Some("  ".into())), "pcs");
        assert_eq!(normalize_unit(Some("N/A".into())), "pcs");
        assert_eq!(normalize_unit(Some("kg".into())), "kg");
    }

    #[test]
    fn stock_change_set_and_add() {
        assert_eq!(StockChange::Set(4).apply(10), Some(4));
        assert_eq!(StockChange::Add(4).apply(10), Some(14));
        assert_eq!(StockChange::Add(-12).apply(10), Some(-2));
    }

    #[test]
    fn stock_change_add_overflow_is_none() {
        assert_eq!(StockChange::Add(i64::MAX).apply(5), None);
        assert_eq!(StockChange::Set(i64::MAX).apply(5), Some(i64::MAX));
    }
}
