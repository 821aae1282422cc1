//! Outlay API Server
//!
//! Main entry point for the Outlay expense approval service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use outlay_api::{AppState, create_router};
use outlay_core::approval::DeadEndPolicy;
use outlay_core::currency::ExchangeRateApiConverter;
use outlay_core::directory::DirectoryService;
use outlay_core::expense::ExpenseService;
use outlay_core::extraction::{ExtractionError, GeminiExtractor};
use outlay_db::{DirectoryRepository, ExpenseRepository, RuleRepository, connect_with};
use outlay_shared::{AppConfig, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outlay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let rules = Arc::new(RuleRepository::new(db.clone()));
    let expenses = Arc::new(ExpenseRepository::new(db.clone()));
    let directory = Arc::new(DirectoryRepository::new(db));

    let converter = ExchangeRateApiConverter::new(&config.currency)?;
    let dead_end_policy = DeadEndPolicy::from_settings(&config.workflow)?;
    info!(policy = ?dead_end_policy, "Dead-end policy configured");

    let mut service = ExpenseService::new(rules, expenses, directory.clone(), Arc::new(converter))
        .with_dead_end_policy(dead_end_policy);
    match GeminiExtractor::new(&config.extraction) {
        Ok(extractor) => {
            info!(model = %config.extraction.model, "Document extraction enabled");
            service = service.with_extractor(Arc::new(extractor));
        }
        Err(ExtractionError::NotConfigured) => {
            warn!("No extraction API key configured; document uploads are disabled");
        }
        Err(e) => return Err(e.into()),
    }

    let jwt_service = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        #[allow(clippy::cast_possible_wrap)]
        access_token_expires_minutes: (config.jwt.access_token_expiry_secs / 60) as i64,
    });

    let state = AppState {
        service: Arc::new(service),
        users: Arc::new(DirectoryService::new(directory.clone())),
        directory,
        jwt_service: Arc::new(jwt_service),
        max_upload_bytes: config.server.max_upload_bytes,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
