use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info, warn};

use crate::models::llm::{LlmConfig, Provider};

pub const AZURE_DEPLOYMENT_KEY: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const AZURE_API_KEY_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const AZURE_ENDPOINT_KEY: &str = "AZURE_OPENAI_ENDPOINT";
pub const OPENAI_API_KEY_KEY: &str = "OPENAI_API_KEY";

/// 读取 .env 格式的配置文件，不写入进程环境变量。文件不存在或无法解析时返回 None
fn read_settings_file(path: &Path) -> Option<HashMap<String, String>> {
    if !path.is_file() {
        error!("{} file not found", path.display());
        return None;
    }
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) => {
            error!("无法读取配置文件 {}: {}", path.display(), e);
            return None;
        }
    };
    let mut values = HashMap::new();
    for item in iter {
        match item {
            Ok((k, v)) => {
                values.insert(k, v);
            }
            Err(e) => {
                error!("配置文件 {} 解析失败: {}", path.display(), e);
                return None;
            }
        }
    }
    Some(values)
}

/// 按部署级 provider 构建 LLM 配置。
///
/// 优先读取配置文件；文件缺失时退回到宿主环境 (`env`) 提供的同名变量。
/// 这里不校验凭据是否齐全，缺失的凭据会在调用模型时报错。
pub fn build_llm_config<F>(provider: Provider, settings_file: &Path, env: F) -> LlmConfig
where
    F: Fn(&str) -> Option<String>,
{
    let file = read_settings_file(settings_file);
    let lookup = |key: &str| -> Option<String> {
        let value = match &file {
            Some(values) => values.get(key).cloned().or_else(|| env(key)),
            None => env(key),
        };
        value.filter(|v| !v.is_empty())
    };

    let config = match provider {
        Provider::CloudHosted => {
            let deployment = lookup(AZURE_DEPLOYMENT_KEY);
            let api_key = lookup(AZURE_API_KEY_KEY);
            let endpoint = lookup(AZURE_ENDPOINT_KEY);
            info!(
                "Using Azure OpenAI: deployment={} endpoint={}",
                deployment.as_deref().unwrap_or("<unset>"),
                endpoint.as_deref().unwrap_or("<unset>")
            );
            LlmConfig::cloud_hosted(api_key, endpoint, deployment)
        }
        Provider::DirectApi => {
            info!("Using OpenAI API");
            LlmConfig::direct_api(lookup(OPENAI_API_KEY_KEY))
        }
    };
    if config.api_key().is_none() {
        warn!("未配置 API key，调用模型时将失败");
    }
    config
}

/// 运行时入口：环境变量作为回退来源
pub fn create_llm_config(provider: Provider, settings_file: &Path) -> LlmConfig {
    build_llm_config(provider, settings_file, |key| std::env::var(key).ok())
}
