//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, DocumentTextExtractor, FileStorage, LopdfRenderer, OpenAiStructuringAdapter,
    },
    config::Config,
    error::ApiError,
    web::{build_router, rest::ApiDoc, state::AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Prepare File Storage ---
    let storage = FileStorage::new(&config.uploads_dir);
    storage.ensure_dirs().await?;

    // --- 4. Initialize Service Adapters ---
    let structurer = Arc::new(OpenAiStructuringAdapter::new(
        config.gemini_api_key.as_deref(),
        &config.ai_api_base,
        config.ai_model.clone(),
    )?);
    info!("AI structuring client ready (model: {})", config.ai_model);

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        storage: storage.clone(),
        extractor: Arc::new(DocumentTextExtractor::new()),
        structurer,
        pdf_renderer: Arc::new(LopdfRenderer::new(storage)),
    });

    // --- 6. Create the Web Router ---
    let cors = match &config.cors_origin {
        Some(origin) => {
            let origin = origin.parse::<HeaderValue>().map_err(|e| {
                ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", origin, e))
            })?;
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE, ACCEPT])
        }
        None => CorsLayer::permissive(),
    };

    let app = build_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
