use axum::{extract::State, Json};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::services::reports::{summarize, STATS_DAYS, TOP_CUSTOMERS};
use crate::AppState;

/// GET /api/stats
pub async fn sales_stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let invoices = state.invoices.list_invoices().await?;
    let stats = summarize(&invoices, TOP_CUSTOMERS, STATS_DAYS);

    Ok(Json(json!({
        "success": true,
        "stats": stats
    })))
}

