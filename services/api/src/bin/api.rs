//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        GeminiGenerationAdapter, InMemorySessionStore, NotionPageAdapter, NotionSettings,
        OpenAiGenerationAdapter, RetryPolicy,
    },
    config::{Config, GenerationProvider},
    error::ApiError,
    web::{self, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client as OpenAiClient};
use std::sync::Arc;
use study_path_core::{GenerationService, Pipeline, StageInvoker};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let http_client = reqwest::Client::builder()
        .build()
        .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {e}")))?;

    let generation: Arc<dyn GenerationService> = match config.generation_provider {
        GenerationProvider::Gemini => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| ApiError::Internal("GEMINI_API_KEY is required".to_string()))?;
            info!(model = %config.gemini_model, "Using the Gemini generation backend.");
            Arc::new(GeminiGenerationAdapter::new(
                http_client.clone(),
                api_key,
                config.gemini_model.clone(),
                config.gemini_api_url.clone(),
            ))
        }
        GenerationProvider::OpenAi => {
            let openai_config = OpenAIConfig::new().with_api_key(
                config
                    .openai_api_key
                    .as_ref()
                    .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
            );
            info!(model = %config.openai_model, "Using the OpenAI generation backend.");
            Arc::new(OpenAiGenerationAdapter::new(
                OpenAiClient::with_config(openai_config),
                config.openai_model.clone(),
            ))
        }
    };

    let pages = Arc::new(NotionPageAdapter::new(
        http_client,
        NotionSettings {
            api_url: config.notion_api_url.clone(),
            token: config.notion_token.clone(),
            version: config.notion_version.clone(),
            parent_page_id: config.notion_parent_page_id.clone(),
            cover_url: config.notion_cover_url.clone(),
        },
        RetryPolicy {
            max_attempts: config.submission_max_attempts,
            base_delay: config.submission_backoff,
        },
    ));

    // --- 3. Build the Shared AppState ---
    let invoker = StageInvoker::new(generation, config.generation_timeout);
    let app_state = Arc::new(AppState {
        config: config.clone(),
        sessions: Arc::new(InMemorySessionStore::new()),
        pipeline: Pipeline::new(invoker, pages),
    });

    // --- 4. Create the Web Router ---
    let app = web::router(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
