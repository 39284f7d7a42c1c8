mod api;
mod core;
mod error;
mod infra;
mod models;
#[cfg(test)]
mod test_support;

use axum::{routing::{get, post}, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::chat::dataframe_chat;
use crate::api::plugin::{get_ai_plugin, get_logo, get_openapi};
use crate::core::llm_agent::LlmAgentBackend;
use crate::infra::server_config::ServerConfig;

pub mod ax_state {
    use super::*;
    use crate::core::agent::AgentBackend;

    pub struct AppState {
        pub config: ServerConfig,
        pub http: reqwest::Client,
        pub agents: Arc<dyn AgentBackend>,
    }
}

pub fn build_router(state: Arc<ax_state::AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/dataframe-chat", post(dataframe_chat))
        .route("/.well-known/ai-plugin.json", get(get_ai_plugin))
        .route("/.well-known/icon", get(get_logo))
        .route("/openapi.yaml", get(get_openapi))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    let http = reqwest::Client::new();
    let addr = config.addr;
    info!("LLM provider: {:?}, 资源目录: {}", config.provider, config.asset_dir.display());

    let agents = LlmAgentBackend::new(http.clone()).with_openai_url(config.openai_url.clone());
    let state = Arc::new(ax_state::AppState {
        config,
        http,
        agents: Arc::new(agents),
    });

    let app = build_router(state);

    info!("frame-chat 运行在 http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
