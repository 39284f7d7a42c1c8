use axum::{
    extract::State,
    http::{header, Uri},
    response::{IntoResponse, Response},
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::ax_state::AppState;
use crate::error::AppError;

pub const MANIFEST_FILE: &str = ".well-known/ai-plugin.json";
pub const ICON_FILE: &str = "logo.png";
pub const OPENAPI_FILE: &str = "openapi.yaml";

/// 原样返回资源目录下的文件
async fn serve_asset(
    state: &AppState,
    uri: &Uri,
    relative: &str,
    mime: &'static str,
) -> Result<Response, AppError> {
    info!("Request: {}", uri);
    let path = state.config.asset_dir.join(Path::new(relative));
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|source| AppError::Asset { path, source })?;
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

/// GET /.well-known/ai-plugin.json
pub async fn get_ai_plugin(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> Result<Response, AppError> {
    serve_asset(&state, &uri, MANIFEST_FILE, "text/json").await
}

/// GET /.well-known/icon
pub async fn get_logo(State(state): State<Arc<AppState>>, uri: Uri) -> Result<Response, AppError> {
    serve_asset(&state, &uri, ICON_FILE, "image/png").await
}

/// GET /openapi.yaml
pub async fn get_openapi(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> Result<Response, AppError> {
    serve_asset(&state, &uri, OPENAPI_FILE, "text/yaml").await
}
