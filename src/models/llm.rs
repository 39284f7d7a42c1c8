use std::fmt;
use std::str::FromStr;

/// Azure OpenAI 部署固定使用的 API 版本
pub const AZURE_API_VERSION: &str = "2023-05-15";

/// 语言模型后端，进程启动时确定，整个部署只用一种
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Azure OpenAI 部署
    CloudHosted,
    /// 直连 OpenAI API
    DirectApi,
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "azure" | "azure-openai" | "cloud" => Ok(Provider::CloudHosted),
            "openai" | "direct" => Ok(Provider::DirectApi),
            other => Err(anyhow::anyhow!("Unknown LLM provider: {}", other)),
        }
    }
}

/// 凭据。两种后端字段互斥，直连模式只有 api_key
#[derive(Clone, PartialEq)]
pub enum LlmCredentials {
    CloudHosted {
        api_key: Option<String>,
        endpoint: Option<String>,
        deployment_name: Option<String>,
        api_version: String,
    },
    DirectApi {
        api_key: Option<String>,
    },
}

// api_key 不允许出现在任何日志里
impl fmt::Debug for LlmCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        match self {
            LlmCredentials::CloudHosted {
                api_key,
                endpoint,
                deployment_name,
                api_version,
            } => f
                .debug_struct("CloudHosted")
                .field("api_key", &redact(api_key))
                .field("endpoint", endpoint)
                .field("deployment_name", deployment_name)
                .field("api_version", api_version)
                .finish(),
            LlmCredentials::DirectApi { api_key } => f
                .debug_struct("DirectApi")
                .field("api_key", &redact(api_key))
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub credentials: LlmCredentials,
    pub temperature: f32,
    pub cache_enabled: bool,
    pub logging_enabled: bool,
}

impl LlmConfig {
    pub fn cloud_hosted(
        api_key: Option<String>,
        endpoint: Option<String>,
        deployment_name: Option<String>,
    ) -> Self {
        Self {
            credentials: LlmCredentials::CloudHosted {
                api_key,
                endpoint,
                deployment_name,
                api_version: AZURE_API_VERSION.to_string(),
            },
            temperature: 0.0,
            cache_enabled: false,
            logging_enabled: false,
        }
    }

    pub fn direct_api(api_key: Option<String>) -> Self {
        Self {
            credentials: LlmCredentials::DirectApi { api_key },
            temperature: 0.0,
            cache_enabled: false,
            logging_enabled: false,
        }
    }

    pub fn provider(&self) -> Provider {
        match self.credentials {
            LlmCredentials::CloudHosted { .. } => Provider::CloudHosted,
            LlmCredentials::DirectApi { .. } => Provider::DirectApi,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        match &self.credentials {
            LlmCredentials::CloudHosted { api_key, .. } | LlmCredentials::DirectApi { api_key } => {
                api_key.as_deref()
            }
        }
    }
}
