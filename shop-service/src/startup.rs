//! Application startup and lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;

use service_core::error::AppError;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;

use crate::config::{ShopConfig, StorageBackend};
use crate::services::{
    EmailProvider, InventoryService, InvoiceMailer, MemoryStore, MockEmailProvider, ShopDb,
    ShopStore, SmtpProvider,
};
use crate::{build_router, AppState};

/// Open the configured backend. MongoDB gets its indexes created here.
pub async fn connect_store(config: &ShopConfig) -> Result<Arc<dyn ShopStore>, AppError> {
    match config.storage {
        StorageBackend::Mongodb => {
            let db = ShopDb::connect(&config.mongodb.uri, &config.mongodb.database)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to MongoDB: {}", e);
                    e
                })?;

            db.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                e
            })?;

            Ok(Arc::new(db))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// SMTP when enabled, otherwise the recording mock.
pub fn email_provider(config: &ShopConfig) -> Arc<dyn EmailProvider> {
    if config.smtp.enabled {
        match SmtpProvider::new(config.smtp.clone()) {
            Ok(provider) => {
                tracing::info!("SMTP email provider initialized");
                Arc::new(provider)
            }
            Err(e) => {
                tracing::warn!("Failed to initialize SMTP provider: {}. Using mock.", e);
                Arc::new(MockEmailProvider::new(true))
            }
        }
    } else {
        tracing::info!("SMTP provider disabled, using mock email provider");
        Arc::new(MockEmailProvider::new(true))
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    mailer_worker: JoinHandle<()>,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ShopConfig) -> Result<Self, AppError> {
        let store = connect_store(&config).await?;
        let email = email_provider(&config);
        Self::build_with(config, store, email).await
    }

    /// Build around an existing store and email provider.
    pub async fn build_with(
        config: ShopConfig,
        store: Arc<dyn ShopStore>,
        email: Arc<dyn EmailProvider>,
    ) -> Result<Self, AppError> {
        InventoryService::new(store.clone())
            .normalize_units()
            .await?;

        let (mailer, mailer_worker) = InvoiceMailer::start(
            email.clone(),
            config.shop.clone(),
            config.mailer.queue_capacity,
        );
        let state = AppState::new(config.clone(), store, email, Some(mailer))?;

        // Port 0 picks a random port for tests
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port, storage = ?config.storage, "Shop service listening");

        Ok(Self {
            port,
            listener,
            state,
            mailer_worker,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until SIGINT/SIGTERM, then let the mailer drain its queue.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let Self {
            listener,
            state,
            mailer_worker,
            ..
        } = self;

        let app = build_router(state);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        // The router owned the last mailer handle
        if let Err(e) = mailer_worker.await {
            tracing::error!("Invoice mailer task failed: {}", e);
        }
        tracing::info!("Shop service stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
