use async_trait::async_trait;
use thiserror::Error;

use crate::core::dataframe::{format_number, DataFrame};
use crate::models::llm::LlmConfig;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected LLM response: {0}")]
    BadResponse(String),

    #[error("Nothing to explain: chat has not been called")]
    NothingToExplain,
}

/// 能以 markdown 形式展示的结果
pub trait Renderable {
    fn to_markdown(&self) -> String;
}

/// 对话结果：文本、数值或表格
#[derive(Debug, Clone, PartialEq)]
pub enum AgentAnswer {
    Text(String),
    Number(f64),
    Table(DataFrame),
}

impl Renderable for AgentAnswer {
    fn to_markdown(&self) -> String {
        match self {
            AgentAnswer::Text(s) => s.clone(),
            AgentAnswer::Number(n) => format_number(*n),
            AgentAnswer::Table(df) => df.to_markdown(),
        }
    }
}

/// 绑定了一份数据的对话代理，生命周期为单个请求
#[async_trait]
pub trait DataAgent: Send {
    async fn chat(&mut self, prompt: &str) -> Result<AgentAnswer, AgentError>;

    /// 解释上一次 chat 的推理过程
    async fn explain(&mut self) -> Result<String, AgentError>;
}

/// 代理工厂，进程启动时注入到 AppState
pub trait AgentBackend: Send + Sync {
    fn create_agent(&self, data: DataFrame, config: LlmConfig) -> Box<dyn DataAgent>;
}
