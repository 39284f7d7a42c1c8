//! 测试用的代理桩与应用状态

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::ax_state::AppState;
use crate::core::agent::{AgentAnswer, AgentBackend, AgentError, DataAgent};
use crate::core::dataframe::DataFrame;
use crate::core::llm_agent::OPENAI_CHAT_URL;
use crate::infra::server_config::ServerConfig;
use crate::models::llm::{LlmConfig, Provider};

/// 记录每次创建代理时收到的数据、配置和提问
#[derive(Default)]
pub struct StubBackend {
    pub seen: Arc<Mutex<Vec<(DataFrame, LlmConfig)>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

struct StubAgent {
    data: DataFrame,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl DataAgent for StubAgent {
    async fn chat(&mut self, prompt: &str) -> Result<AgentAnswer, AgentError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(AgentAnswer::Table(self.data.head(1)))
    }

    async fn explain(&mut self) -> Result<String, AgentError> {
        Ok("I looked at the first row.".to_string())
    }
}

impl AgentBackend for StubBackend {
    fn create_agent(&self, data: DataFrame, config: LlmConfig) -> Box<dyn DataAgent> {
        self.seen.lock().unwrap().push((data.clone(), config));
        Box::new(StubAgent {
            data,
            prompts: self.prompts.clone(),
        })
    }
}

pub fn test_state(asset_dir: &Path, backend: Arc<StubBackend>) -> Arc<AppState> {
    Arc::new(AppState {
        config: ServerConfig {
            addr: ([127, 0, 0, 1], 0).into(),
            provider: Provider::CloudHosted,
            asset_dir: asset_dir.to_path_buf(),
            settings_file: asset_dir.join(".env"),
            openai_url: OPENAI_CHAT_URL.to_string(),
        },
        http: reqwest::Client::new(),
        agents: backend,
    })
}

/// 在本地端口上提供文件下载，返回 `http://127.0.0.1:port`
pub async fn serve_files(files: Vec<(&'static str, Vec<u8>)>) -> String {
    let mut app = axum::Router::new();
    for (path, bytes) in files {
        app = app.route(
            path,
            axum::routing::get(move || {
                let body = bytes.clone();
                async move { body }
            }),
        );
    }
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// 收集日志输出，供断言日志内容
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// 在当前线程安装写入本缓冲区的订阅者
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
