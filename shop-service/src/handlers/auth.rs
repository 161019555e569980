use axum::{extract::State, Json};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::dtos::{SendOtpRequest, VerifyOtpRequest};
use crate::utils::ValidatedJson;
use crate::AppState;

/// POST /api/auth/otp/send
pub async fn send_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SendOtpRequest>,
) -> Result<Json<Value>, AppError> {
    let sent = state.otp.send(&req.email).await?;
    Ok(Json(json!({
        "success": true,
        "otp_id": sent.otp_id,
        "expires_in": sent.expires_in,
        "message": "Login code sent"
    })))
}

/// POST /api/auth/otp/verify
pub async fn verify_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> Result<Json<Value>, AppError> {
    let token = state.otp.verify(&req.otp_id, &req.code).await?;
    Ok(Json(json!({
        "success": true,
        "access_token": token.access_token,
        "token_type": token.token_type,
        "expires_in": token.expires_in
    })))
}
