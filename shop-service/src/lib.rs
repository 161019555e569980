pub mod config;
pub mod console;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ShopConfig;
use crate::services::{
    EmailProvider, InventoryService, InvoiceMailer, InvoiceService, JwtService, OtpService,
    ShopStore,
};

/// Requests per minute per IP on the OTP endpoints.
const OTP_ROUTE_ATTEMPTS: u32 = 10;

#[derive(Clone)]
pub struct AppState {
    pub config: ShopConfig,
    pub store: Arc<dyn ShopStore>,
    pub inventory: InventoryService,
    pub invoices: InvoiceService,
    pub otp: OtpService,
    pub jwt: JwtService,
    pub otp_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(
        config: ShopConfig,
        store: Arc<dyn ShopStore>,
        email: Arc<dyn EmailProvider>,
        mailer: Option<InvoiceMailer>,
    ) -> Result<Self, AppError> {
        let jwt = JwtService::new(&config.jwt).map_err(AppError::ConfigError)?;

        Ok(Self {
            inventory: InventoryService::new(store.clone()),
            invoices: InvoiceService::new(store.clone(), mailer, config.shop.clone()),
            otp: OtpService::new(
                store.clone(),
                email,
                jwt.clone(),
                config.auth.clone(),
                config.otp.clone(),
                config.shop.name.clone(),
            ),
            jwt,
            otp_rate_limiter: create_ip_rate_limiter(OTP_ROUTE_ATTEMPTS, 60),
            store,
            config,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let otp_routes = Router::new()
        .route("/api/auth/otp/send", post(handlers::auth::send_otp))
        .route("/api/auth/otp/verify", post(handlers::auth::verify_otp))
        .layer(from_fn_with_state(
            state.otp_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let shop_routes = Router::new()
        .route(
            "/api/items",
            get(handlers::items::list_items).post(handlers::items::add_item),
        )
        .route("/api/items/search", get(handlers::items::search_items))
        .route(
            "/api/items/:id",
            put(handlers::items::update_item).delete(handlers::items::delete_item),
        )
        .route(
            "/api/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route("/api/invoices/:id", get(handlers::invoices::get_invoice))
        .route("/api/invoices/:id/pdf", get(handlers::invoices::invoice_pdf))
        .route("/api/stats", get(handlers::stats::sales_stats))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics))
        .merge(otp_routes)
        .merge(shop_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::permissive())
}
