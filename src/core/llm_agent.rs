use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::core::agent::{AgentAnswer, AgentBackend, AgentError, DataAgent};
use crate::core::dataframe::{CellValue, DataFrame};
use crate::models::llm::{LlmConfig, LlmCredentials};

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// 系统提示中展示的样例行数
const PREVIEW_ROWS: usize = 5;

/// 纯数字回复，逗号只能作为千位分隔符出现
static NUMBER_REPLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(\d+|\d{1,3}(,\d{3})+)(\.\d+)?$").unwrap());

const ANSWER_INSTRUCTIONS: &str = "Answer the question using only the dataframe above. \
If the answer is a single number, reply with the number only. \
If the answer is a table, reply with a JSON object {\"columns\": [...], \"rows\": [[...]]} and nothing else. \
Otherwise reply with a short plain-text answer.";

const EXPLAIN_PROMPT: &str = "Explain how you arrived at your last answer for a non-technical \
audience, without mentioning technical details or the libraries used.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct TableReply {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// 基于 chat-completions 接口的代理工厂
pub struct LlmAgentBackend {
    client: Client,
    openai_url: String,
}

impl LlmAgentBackend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            openai_url: OPENAI_CHAT_URL.to_string(),
        }
    }

    /// 直连模式的接口地址，测试时指向本地模拟服务
    pub fn with_openai_url(mut self, url: impl Into<String>) -> Self {
        self.openai_url = url.into();
        self
    }
}

impl AgentBackend for LlmAgentBackend {
    fn create_agent(&self, data: DataFrame, config: LlmConfig) -> Box<dyn DataAgent> {
        let messages = vec![ChatMessage::new("system", describe_dataframe(&data))];
        Box::new(LlmAgent {
            client: self.client.clone(),
            openai_url: self.openai_url.clone(),
            config,
            messages,
            answered: false,
        })
    }
}

pub struct LlmAgent {
    client: Client,
    openai_url: String,
    config: LlmConfig,
    messages: Vec<ChatMessage>,
    answered: bool,
}

fn describe_dataframe(df: &DataFrame) -> String {
    let (rows, cols) = df.shape();
    format!(
        "You are a data analyst. You are given a dataframe with {} rows and {} columns.\n\
         Columns: {}\n\
         These are the first {} rows:\n{}",
        rows,
        cols,
        df.columns.join(", "),
        rows.min(PREVIEW_ROWS),
        df.head(PREVIEW_ROWS).to_markdown()
    )
}

impl LlmAgent {
    async fn complete(&self) -> Result<String, AgentError> {
        let builder = match &self.config.credentials {
            LlmCredentials::CloudHosted {
                api_key,
                endpoint,
                deployment_name,
                api_version,
            } => {
                let endpoint = endpoint
                    .as_deref()
                    .ok_or(AgentError::MissingCredential("AZURE_OPENAI_ENDPOINT"))?;
                let deployment = deployment_name
                    .as_deref()
                    .ok_or(AgentError::MissingCredential("AZURE_OPENAI_DEPLOYMENT_NAME"))?;
                let key = api_key
                    .as_deref()
                    .ok_or(AgentError::MissingCredential("AZURE_OPENAI_API_KEY"))?;
                let url = format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    endpoint.trim_end_matches('/'),
                    deployment,
                    api_version
                );
                self.client
                    .post(url)
                    .header("api-key", key)
                    .json(&CompletionRequest {
                        model: None,
                        messages: &self.messages,
                        temperature: self.config.temperature,
                    })
            }
            LlmCredentials::DirectApi { api_key } => {
                let key = api_key
                    .as_deref()
                    .ok_or(AgentError::MissingCredential("OPENAI_API_KEY"))?;
                self.client
                    .post(&self.openai_url)
                    .bearer_auth(key)
                    .json(&CompletionRequest {
                        model: Some(OPENAI_MODEL),
                        messages: &self.messages,
                        temperature: self.config.temperature,
                    })
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AgentError::BadResponse("no choices in completion".into()))?;

        if self.config.logging_enabled {
            debug!("LLM 回复: {}", reply);
        }
        Ok(reply)
    }

    async fn exchange(&mut self, content: String) -> Result<String, AgentError> {
        if self.config.logging_enabled {
            debug!("LLM 请求: {}", content);
        }
        self.messages.push(ChatMessage::new("user", content));
        match self.complete().await {
            Ok(reply) => {
                self.messages.push(ChatMessage::new("assistant", reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                // 失败的提问不保留在上下文中
                self.messages.pop();
                Err(e)
            }
        }
    }
}

#[async_trait]
impl DataAgent for LlmAgent {
    async fn chat(&mut self, prompt: &str) -> Result<AgentAnswer, AgentError> {
        let reply = self
            .exchange(format!("{}\n\nQuestion: {}", ANSWER_INSTRUCTIONS, prompt))
            .await?;
        self.answered = true;
        let answer = parse_reply(&reply);
        info!("代理已作答 (provider={:?})", self.config.provider());
        Ok(answer)
    }

    async fn explain(&mut self) -> Result<String, AgentError> {
        if !self.answered {
            return Err(AgentError::NothingToExplain);
        }
        let reply = self.exchange(EXPLAIN_PROMPT.to_string()).await?;
        Ok(reply.trim().to_string())
    }
}

fn json_to_cell(v: &Value) -> CellValue {
    match v {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Bool(*b),
        Value::Number(n) => n
            .as_f64()
            .map(CellValue::Number)
            .unwrap_or_else(|| CellValue::Text(n.to_string())),
        Value::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

/// 表格 JSON -> Table，纯数字 -> Number，其余按文本处理
fn parse_reply(reply: &str) -> AgentAnswer {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if let Ok(table) = serde_json::from_str::<TableReply>(unfenced) {
        let rows = table
            .rows
            .iter()
            .map(|r| r.iter().map(json_to_cell).collect())
            .collect();
        return AgentAnswer::Table(DataFrame::new(table.columns, rows));
    }
    if let Some(n) = parse_number(unfenced) {
        return AgentAnswer::Number(n);
    }
    AgentAnswer::Text(trimmed.to_string())
}

fn parse_number(reply: &str) -> Option<f64> {
    if !NUMBER_REPLY.is_match(reply) {
        return None;
    }
    reply
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}
