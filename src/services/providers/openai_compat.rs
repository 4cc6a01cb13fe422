//! OpenAI 兼容适配器（Groq / OpenRouter）
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 只需替换 API 端点和模型名即可接入兼容服务

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::GatewayError;
use crate::models::credentials::ProviderId;
use crate::services::providers::GenerationProvider;

pub struct OpenAiCompatibleProvider {
    id: ProviderId,
    base_url: String,
    model_name: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: ProviderId, base_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            id,
            base_url: base_url.into(),
            model_name: model_name.into(),
        }
    }

    fn failed(&self, reason: impl std::fmt::Display) -> GatewayError {
        GatewayError::request_failed(self.id.as_str(), reason)
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatibleProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn complete(
        &self,
        secret: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        debug!("调用 {} API，模型: {}", self.id, self.model_name);

        // 密钥随调用传入，客户端按次构造
        let openai_config = OpenAIConfig::new()
            .with_api_key(secret)
            .with_api_base(&self.base_url);
        let client = Client::with_config(openai_config);

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| self.failed(e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(0.5)
            .build()
            .map_err(|e| self.failed(e))?;

        let chat = client.chat();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            response = chat.create(request) => response.map_err(|e| self.failed(e))?,
        };

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| self.failed("返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_before_reply() {
        let provider = OpenAiCompatibleProvider::new(
            ProviderId::Groq,
            "http://127.0.0.1:9/openai/v1",
            "llama-3.1-8b-instant",
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = provider.complete("gsk", "hi", &cancel).await.unwrap_err();
        assert!(matches!(err, GatewayError::Cancelled));
    }

    #[tokio::test]
    #[ignore] // 需要 GROQ_API_KEY
    async fn test_groq_live() {
        let _ = tracing_subscriber::fmt::try_init();
        let Ok(key) = std::env::var("GROQ_API_KEY") else {
            return;
        };
        let provider = OpenAiCompatibleProvider::new(
            ProviderId::Groq,
            "https://api.groq.com/openai/v1",
            "llama-3.1-8b-instant",
        );
        let reply = provider
            .complete(&key, "Reply with the single word: pong", &CancellationToken::new())
            .await
            .unwrap();
        println!("Groq 响应: {}", reply);
    }
}
