use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState, root_routes};
use axum::{extract::FromRef, Router};
use common::{
    storage::db::SurrealDbClient,
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use html_router::{html_routes, html_state::HtmlState};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::IndexAccessor;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    // Open the file-backed vector store and make sure its schema exists
    tokio::fs::create_dir_all(&config.persist_dir).await?;
    let db = Arc::new(SurrealDbClient::open(&config.store_path()).await?);
    db.ensure_initialized(config.embedding_dimensions as usize)
        .await?;

    let llm = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    let embeddings = Arc::new(EmbeddingProvider::from_config(&config, Arc::clone(&llm)));
    info!(
        embedding_backend = embeddings.backend_label(),
        embedding_dimension = embeddings.dimension(),
        "Embedding provider initialized"
    );

    let accessor = Arc::new(IndexAccessor::new(
        Arc::clone(&db),
        Arc::clone(&embeddings),
    ));
    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&db),
        Arc::clone(&llm),
        Arc::clone(&embeddings),
        Arc::clone(&accessor),
        config.model.clone(),
    ));

    let api_state = ApiState::new(
        Arc::clone(&db),
        config.clone(),
        Arc::clone(&llm),
        Arc::clone(&accessor),
        pipeline,
    );
    let html_state = HtmlState::new(llm, accessor, config.clone());

    // Create Axum router
    let app = Router::new()
        .nest("/api/v1", api_routes_v1())
        .merge(root_routes())
        .merge(html_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            api_state,
            html_state,
        });

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
    html_state: HtmlState,
}
