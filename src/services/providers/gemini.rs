//! Gemini 适配器
//!
//! `POST {base}/models/{model}:generateContent`，密钥放在 `x-goog-api-key` 头中

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{GatewayError, HttpError};
use crate::infrastructure::HttpExecutor;
use crate::models::credentials::ProviderId;
use crate::services::providers::GenerationProvider;

pub struct GeminiProvider {
    http: HttpExecutor,
    base_url: String,
    model_name: String,
}

impl GeminiProvider {
    pub fn new(http: HttpExecutor, base_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model_name: model_name.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model_name
        )
    }
}

/// 拼接 `candidates[0].content.parts[*].text`
pub fn normalize_gemini_reply(reply: &JsonValue) -> Option<String> {
    let parts = reply
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(JsonValue::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn complete(
        &self,
        secret: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        debug!("调用 Gemini API，模型: {}", self.model_name);
        let body = json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ]
        });

        let reply: JsonValue = self
            .http
            .post_json(
                &self.endpoint(),
                &[("x-goog-api-key", secret.to_string())],
                &body,
                cancel,
            )
            .await
            .map_err(|e| match e {
                HttpError::Cancelled => GatewayError::Cancelled,
                other => GatewayError::request_failed(self.id().as_str(), other),
            })?;

        normalize_gemini_reply(&reply)
            .ok_or_else(|| GatewayError::request_failed(self.id().as_str(), "Gemini 返回内容为空"))
    }
}
