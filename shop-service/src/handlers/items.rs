use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::dtos::{CreateItemRequest, ItemResponse, SearchQuery, UpdateItemRequest};
use crate::middleware::Operator;
use crate::utils::ValidatedJson;
use crate::AppState;

fn item_list(items: Vec<crate::models::Item>) -> Vec<ItemResponse> {
    items.into_iter().map(ItemResponse::from).collect()
}

pub async fn list_items(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let items = state.inventory.list_items().await?;
    Ok(Json(json!({ "success": true, "items": item_list(items) })))
}

pub async fn search_items(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let items = state.inventory.search_items(&query.q).await?;
    Ok(Json(json!({ "success": true, "items": item_list(items) })))
}

/// Creates the item, or restocks it when the name already exists.
pub async fn add_item(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateItemRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let added = state.inventory.add_item(req.into()).await?;

    let (status, message) = if added.created {
        (StatusCode::CREATED, "Item added successfully")
    } else {
        (StatusCode::OK, "Item already exists, stock updated")
    };

    Ok((
        status,
        Json(json!({
            "success": true,
            "created": added.created,
            "message": message,
            "item": ItemResponse::from(added.item)
        })),
    ))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateItemRequest>,
) -> Result<Json<Value>, AppError> {
    let item = state.inventory.update_item(&id, req.into()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Item updated successfully",
        "item": ItemResponse::from(item)
    })))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.inventory.delete_item(&id).await?;
    if let Some(claims) = operator {
        tracing::info!(item_id = %id, operator = %claims.sub, "Item removed by operator");
    }
    Ok(Json(json!({
        "success": true,
        "message": "Item deleted successfully"
    })))
}
