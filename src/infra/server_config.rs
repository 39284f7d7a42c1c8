use anyhow::Context;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::core::llm_agent::OPENAI_CHAT_URL;
use crate::models::llm::Provider;

pub const DEFAULT_ADDR: &str = "0.0.0.0:7071";

/// 进程级配置，启动时读取一次
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub provider: Provider,
    pub asset_dir: PathBuf,
    pub settings_file: PathBuf,
    /// 直连模式的 chat-completions 地址
    pub openai_url: String,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup("FRAME_CHAT_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("FRAME_CHAT_ADDR must be a socket address")?;
        let provider = match lookup("LLM_PROVIDER") {
            Some(p) => p.parse()?,
            None => Provider::CloudHosted,
        };
        Ok(Self {
            addr,
            provider,
            asset_dir: lookup("FRAME_CHAT_ASSET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            settings_file: lookup("FRAME_CHAT_SETTINGS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".env")),
            openai_url: lookup("OPENAI_CHAT_URL").unwrap_or_else(|| OPENAI_CHAT_URL.to_string()),
        })
    }
}
