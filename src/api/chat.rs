use axum::{
    body::Bytes,
    extract::{Query, State},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{field, info, instrument, Span};

use crate::ax_state::AppState;
use crate::core::agent::Renderable;
use crate::error::AppError;
use crate::infra::loader::{load_dataframe, redact_location};
use crate::infra::settings::create_llm_config;
use crate::models::context::{ChatRequest, ChatResult};
use crate::models::llm::LlmConfig;

/// POST /api/dataframe-chat
/// 处理流程：校验参数 -> 构建 LLM 配置 -> 加载表格 -> 对话 + 解释 -> 拼接文本返回
#[instrument(skip_all, fields(file_loc = tracing::field::Empty))]
pub async fn dataframe_chat(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<String, AppError> {
    // 1. 参数校验必须先于任何 IO
    let request = ChatRequest::from_parts(&params, &body)?;
    Span::current().record("file_loc", field::display(redact_location(&request.file_loc)));
    info!("接收到对话请求");

    // 2. 每个请求重新构建配置，读配置文件放到阻塞线程池
    let provider = state.config.provider;
    let settings_file = state.config.settings_file.clone();
    let config =
        tokio::task::spawn_blocking(move || create_llm_config(provider, &settings_file)).await?;

    let result = dispatch(&state, &request, config).await?;
    let text = result.to_string();

    info!("Result: {}", text);
    Ok(text)
}

async fn dispatch(
    state: &AppState,
    request: &ChatRequest,
    config: LlmConfig,
) -> Result<ChatResult, AppError> {
    let data = load_dataframe(&request.file_loc, &state.http).await?;

    let mut agent = state.agents.create_agent(data, config);
    let answer = agent.chat(&request.prompt).await?;
    let explanation = agent.explain().await?;

    Ok(ChatResult {
        answer_markdown: answer.to_markdown(),
        explanation,
    })
}
