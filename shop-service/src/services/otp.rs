//! Email one-time-password login for shop operators.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use service_core::error::AppError;
use validator::ValidateEmail;

use super::email::{EmailMessage, EmailProvider};
use super::jwt::{JwtService, TokenResponse};
use super::store::ShopStore;
use crate::config::{AuthConfig, OtpConfig};
use crate::models::OtpCode;

const OTP_LENGTH: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct SendOtpResponse {
    pub otp_id: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn ShopStore>,
    email: Arc<dyn EmailProvider>,
    jwt: JwtService,
    auth: AuthConfig,
    config: OtpConfig,
    shop_name: String,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn ShopStore>,
        email: Arc<dyn EmailProvider>,
        jwt: JwtService,
        auth: AuthConfig,
        config: OtpConfig,
        shop_name: String,
    ) -> Self {
        Self {
            store,
            email,
            jwt,
            auth,
            config,
            shop_name,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn send(&self, destination: &str) -> Result<SendOtpResponse, AppError> {
        let destination = destination.trim().to_lowercase();
        if !destination.validate_email() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Invalid email format")));
        }

        if !self.auth.is_operator(&destination) {
            tracing::warn!("OTP requested for an address outside the operator list");
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "This address is not allowed to sign in"
            )));
        }

        let window = Duration::minutes(self.config.send_window_minutes);
        let recent = self
            .store
            .count_recent_otps(&destination, Utc::now() - window)
            .await?;
        if recent >= self.config.max_sends_per_window {
            return Err(AppError::TooManyRequests(
                "Too many OTP requests. Please try again later.".to_string(),
                Some(window.num_seconds() as u64),
            ));
        }

        let code = generate_otp(OTP_LENGTH);
        let otp = OtpCode::new(
            destination.clone(),
            hash_otp(&code),
            self.config.ttl_seconds,
            self.config.max_attempts,
        );
        self.store.insert_otp(&otp).await?;

        // Never log the code itself
        let message = EmailMessage {
            to: destination,
            subject: format!("Your {} login code", self.shop_name),
            body_text: format!(
                "Your login code is {}. It expires in {} minutes.",
                code,
                self.config.ttl_seconds / 60
            ),
            attachments: Vec::new(),
        };
        self.email.send(&message).await.map_err(|e| {
            tracing::error!(otp_id = %otp.otp_id, "Failed to deliver OTP email: {}", e);
            AppError::BadGateway("Failed to deliver login code".to_string())
        })?;

        tracing::info!(otp_id = %otp.otp_id, "OTP email sent");

        Ok(SendOtpResponse {
            otp_id: otp.otp_id,
            expires_in: self.config.ttl_seconds,
        })
    }

    #[tracing::instrument(skip(self, code))]
    pub async fn verify(&self, otp_id: &str, code: &str) -> Result<TokenResponse, AppError> {
        let otp = self
            .store
            .find_otp(otp_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("OTP not found")))?;

        if otp.is_consumed() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "OTP has already been used"
            )));
        }
        if otp.is_expired() {
            return Err(AppError::BadRequest(anyhow::anyhow!("OTP has expired")));
        }
        if otp.attempts_exhausted() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Maximum verification attempts exceeded"
            )));
        }

        self.store.increment_otp_attempts(&otp.otp_id).await?;

        if hash_otp(code.trim()) != otp.code_hash {
            return Err(AppError::AuthError(anyhow::anyhow!("Invalid OTP code")));
        }

        // A concurrent verify may have won the race
        if !self.store.consume_otp(&otp.otp_id).await? {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "OTP has already been used"
            )));
        }

        let token = self.jwt.issue_token(&otp.destination).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Token generation failed: {}", e))
        })?;

        tracing::info!("Operator signed in");
        Ok(token)
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }
}

/// Generate a random numeric OTP.
pub fn generate_otp(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| rng.gen_range(0..10).to_string())
        .collect()
}

/// Hash an OTP code for storage.
pub fn hash_otp(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pull the 6-digit code out of a login email body.
pub fn extract_code(body: &str) -> Option<String> {
    body.split(|c: char| !c.is_ascii_digit())
        .find(|part| part.len() == OTP_LENGTH)
        .map(str::to_string)
}
