use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::dtos::{CreateInvoiceRequest, InvoiceResponse};
use crate::middleware::Operator;
use crate::services::pdf::invoice_filename;
use crate::utils::ValidatedJson;
use crate::AppState;

pub async fn create_invoice(
    State(state): State<AppState>,
    Operator(operator): Operator,
    ValidatedJson(req): ValidatedJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let invoice = state.invoices.create_invoice(req.into()).await?;
    if let Some(claims) = operator {
        tracing::info!(invoice_id = invoice.invoice_id, operator = %claims.sub, "Invoice issued by operator");
    }
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Invoice created successfully",
            "invoice_id": invoice.invoice_id,
            "invoice": InvoiceResponse::from(invoice)
        })),
    ))
}

pub async fn list_invoices(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let invoices: Vec<InvoiceResponse> = state
        .invoices
        .list_invoices()
        .await?
        .into_iter()
        .map(InvoiceResponse::from)
        .collect();
    Ok(Json(json!({ "success": true, "invoices": invoices })))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let invoice = state.invoices.get_invoice(id).await?;
    Ok(Json(json!({
        "success": true,
        "invoice": InvoiceResponse::from(invoice)
    })))
}

/// Download the rendered invoice as `invoice_<id>.pdf`.
pub async fn invoice_pdf(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let pdf = state.invoices.invoice_pdf(id).await?;
    let disposition = format!("attachment; filename=\"{}\"", invoice_filename(id));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}
