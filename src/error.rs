use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::error;

use crate::core::agent::AgentError;
use crate::infra::loader::LoadError;

/// 请求级错误。不做区分处理，统一按服务端错误返回
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{} must be set in POST.", parameter_label(.0))]
    MissingParameter(&'static str),

    #[error("Failed to build LLM config: {0}")]
    Config(#[from] tokio::task::JoinError),

    #[error("Failed to load data: {0}")]
    DataLoad(#[from] LoadError),

    #[error("Agent call failed: {0}")]
    Agent(#[from] AgentError),

    #[error("Failed to read asset {}: {source}", .path.display())]
    Asset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 提示文本中 prompt 称作 "prompt data"
fn parameter_label(field: &str) -> &str {
    match field {
        "prompt" => "prompt data",
        other => other,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("请求处理失败: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
