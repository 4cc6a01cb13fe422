//! HTTP 执行器 - 基础设施层
//!
//! 持有唯一的 `reqwest::Client`，只暴露"发请求"的能力

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::HttpError;
use crate::infrastructure::bounded::{bounded, Interrupted};
use crate::utils::logging::truncate_text;

/// HTTP 执行器
///
/// 职责：
/// - 持有唯一的 Client（连接池）
/// - 每次调用都带超时与取消
/// - 非 2xx 统一转换为 `HttpError::Status`
/// - 不认识题目 / 会话
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
    timeout: Duration,
}

impl HttpExecutor {
    /// 创建新的 HTTP 执行器
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(concat!("question_forge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    /// POST JSON 并把响应解析为 `T`
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {}", url);
        let request = with_headers(self.client.post(url), headers).json(body);
        self.send_json(request, cancel).await
    }

    /// GET 并把响应解析为 `T`
    pub async fn get_json<T>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        debug!("GET {}", url);
        let request = with_headers(self.client.get(url), headers);
        self.send_json(request, cancel).await
    }

    /// 以 multipart 上传单个文件（字段名 `file`）
    pub async fn post_file<T>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        file_name: &str,
        bytes: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        debug!("POST {} (multipart, {} 字节)", url, bytes.len());
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let request = with_headers(self.client.post(url), headers).multipart(form);
        self.send_json(request, cancel).await
    }

    async fn send_json<T>(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let call = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(HttpError::Status {
                    status: status.as_u16(),
                    body: truncate_text(&text, 300),
                });
            }
            decode::<T>(&text)
        };

        match bounded(cancel, self.timeout, call).await {
            Ok(result) => result,
            Err(Interrupted::TimedOut) => Err(HttpError::Timeout),
            Err(Interrupted::Cancelled) => Err(HttpError::Cancelled),
        }
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(&str, String)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, value);
    }
    request
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, HttpError> {
    // 空响应体按 null 处理，方便 `()` / `Option<T>` 之类的返回类型
    let value: JsonValue = if text.trim().is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_str(text)
            .map_err(|e| HttpError::Decode(format!("{} (内容: {})", e, truncate_text(text, 120))))?
    };
    serde_json::from_value(value).map_err(|e| HttpError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TextBody {
        text: String,
    }

    #[test]
    fn test_decode_object() {
        let body: TextBody = decode(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(body.text, "hello");
    }

    #[test]
    fn test_decode_empty_body_as_null() {
        let body: Option<TextBody> = decode("  ").unwrap();
        assert!(body.is_none());
    }

    #[test]
    fn test_decode_reports_bad_json() {
        let err = decode::<TextBody>("<html>502</html>").unwrap_err();
        assert!(matches!(err, HttpError::Decode(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let executor = HttpExecutor::new(Duration::from_secs(5)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<JsonValue, HttpError> = executor
            .get_json("http://127.0.0.1:9/never", &[], &cancel)
            .await;
        assert!(matches!(result, Err(HttpError::Cancelled)));
    }
}
