//! 生成服务提供方适配器
//!
//! 每个适配器把各自的请求 / 响应格式统一为"提示词 → 纯文本"。

pub mod gemini;
pub mod openai_compat;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::GatewayError;
use crate::infrastructure::HttpExecutor;
use crate::models::credentials::ProviderId;

pub use gemini::{normalize_gemini_reply, GeminiProvider};
pub use openai_compat::OpenAiCompatibleProvider;

/// 生成服务提供方
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// 发送提示词，返回模型回复的纯文本
    ///
    /// 非 2xx、网络错误、空回复都返回 `GatewayError::RequestFailed`。
    async fn complete(
        &self,
        secret: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError>;
}

/// 按配置构造某个提供方的适配器
pub fn build_provider(id: ProviderId, config: &Config, http: &HttpExecutor) -> Box<dyn GenerationProvider> {
    match id {
        ProviderId::Gemini => Box::new(GeminiProvider::new(
            http.clone(),
            config.gemini_api_base_url.clone(),
            config.gemini_model_name.clone(),
        )),
        ProviderId::Groq => Box::new(OpenAiCompatibleProvider::new(
            ProviderId::Groq,
            config.groq_api_base_url.clone(),
            config.groq_model_name.clone(),
        )),
        ProviderId::OpenRouter => Box::new(OpenAiCompatibleProvider::new(
            ProviderId::OpenRouter,
            config.openrouter_api_base_url.clone(),
            config.openrouter_model_name.clone(),
        )),
    }
}
