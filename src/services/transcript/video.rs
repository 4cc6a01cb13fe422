//! 视频文本来源

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AcquisitionError, HttpError};
use crate::infrastructure::HttpExecutor;
use crate::services::transcript::{AcquisitionTarget, TranscriptSource, VideoRef};

/// `{ "text": "..." }` 形式的响应
#[derive(Debug, Deserialize)]
struct TextReply {
    #[serde(default)]
    text: Option<String>,
}

fn video_of(target: &AcquisitionTarget) -> Result<&VideoRef, AcquisitionError> {
    match target {
        AcquisitionTarget::Video(video) => Ok(video),
        AcquisitionTarget::Document(_) => {
            Err(AcquisitionError::InvalidReference(target.describe()))
        }
    }
}

fn map_http(source_name: &str, err: HttpError) -> AcquisitionError {
    match err {
        HttpError::Cancelled => AcquisitionError::Cancelled,
        other => AcquisitionError::unavailable(source_name, other),
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// 独立转录服务
///
/// `POST {base}/youtube-transcript { url }` → `{ text }`
pub struct TranscriptServiceSource {
    http: HttpExecutor,
    base_url: Option<String>,
}

impl TranscriptServiceSource {
    pub fn new(http: HttpExecutor, base_url: Option<String>) -> Self {
        Self { http, base_url }
    }
}

#[async_trait]
impl TranscriptSource for TranscriptServiceSource {
    fn name(&self) -> &str {
        "转录服务"
    }

    fn accepts(&self, target: &AcquisitionTarget) -> bool {
        matches!(target, AcquisitionTarget::Video(_))
    }

    fn is_configured(&self) -> bool {
        self.base_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    async fn fetch(
        &self,
        target: &AcquisitionTarget,
        cancel: &CancellationToken,
    ) -> Result<String, AcquisitionError> {
        let video = video_of(target)?;
        let base = self.base_url.as_deref().unwrap_or_default();
        let reply: TextReply = self
            .http
            .post_json(
                &join_url(base, "youtube-transcript"),
                &[],
                &json!({ "url": video.watch_url() }),
                cancel,
            )
            .await
            .map_err(|e| map_http(self.name(), e))?;
        Ok(reply.text.unwrap_or_default())
    }
}

/// 托管字幕函数
///
/// `POST {functions}/youtube-transcript`，使用匿名密钥作为 Bearer
pub struct CaptionFunctionSource {
    http: HttpExecutor,
    functions_base: Option<String>,
    anon_key: Option<String>,
}

impl CaptionFunctionSource {
    pub fn new(http: HttpExecutor, functions_base: Option<String>, anon_key: Option<String>) -> Self {
        Self {
            http,
            functions_base,
            anon_key,
        }
    }
}

#[async_trait]
impl TranscriptSource for CaptionFunctionSource {
    fn name(&self) -> &str {
        "字幕函数"
    }

    fn accepts(&self, target: &AcquisitionTarget) -> bool {
        matches!(target, AcquisitionTarget::Video(_))
    }

    fn is_configured(&self) -> bool {
        self.functions_base.is_some() && self.anon_key.is_some()
    }

    async fn fetch(
        &self,
        target: &AcquisitionTarget,
        cancel: &CancellationToken,
    ) -> Result<String, AcquisitionError> {
        let video = video_of(target)?;
        let base = self.functions_base.as_deref().unwrap_or_default();
        let key = self.anon_key.as_deref().unwrap_or_default();
        let reply: TextReply = self
            .http
            .post_json(
                &join_url(base, "youtube-transcript"),
                &[("Authorization", format!("Bearer {}", key))],
                &json!({ "url": video.watch_url() }),
                cancel,
            )
            .await
            .map_err(|e| map_http(self.name(), e))?;
        Ok(reply.text.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioUrlReply {
    audio_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
    speech_model: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscriptJob {
    id: Option<String>,
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// 语音转文字（付费）
///
/// 1. `POST {helper}/youtube-audio-url { url }` → `{ audioUrl }`
/// 2. `POST {base}/v2/transcript` 提交任务
/// 3. 轮询 `GET {base}/v2/transcript/{id}` 直到 `completed` 或 `error`
pub struct SpeechToTextSource {
    http: HttpExecutor,
    helper_url: Option<String>,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
    max_polls: u32,
}

impl SpeechToTextSource {
    pub fn new(
        http: HttpExecutor,
        helper_url: Option<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        poll_interval: Duration,
        max_polls: u32,
    ) -> Self {
        Self {
            http,
            helper_url,
            base_url: base_url.into(),
            api_key,
            poll_interval,
            max_polls,
        }
    }

    pub fn from_config(http: HttpExecutor, config: &Config) -> Self {
        Self::new(
            http,
            config.audio_helper_url.clone(),
            config.speech_to_text_base_url.clone(),
            config.speech_to_text_api_key.clone(),
            Duration::from_secs(config.speech_poll_interval_secs.max(1)),
            config.speech_max_polls.max(1),
        )
    }

    async fn resolve_audio_url(
        &self,
        video: &VideoRef,
        cancel: &CancellationToken,
    ) -> Result<String, AcquisitionError> {
        let helper = self.helper_url.as_deref().unwrap_or_default();
        let reply: AudioUrlReply = self
            .http
            .post_json(
                &join_url(helper, "youtube-audio-url"),
                &[],
                &json!({ "url": video.watch_url() }),
                cancel,
            )
            .await
            .map_err(|e| map_http(self.name(), e))?;
        reply
            .audio_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AcquisitionError::unavailable(self.name(), "音频地址为空"))
    }

    fn auth(&self) -> [(&'static str, String); 1] {
        [("authorization", self.api_key.clone().unwrap_or_default())]
    }
}

#[async_trait]
impl TranscriptSource for SpeechToTextSource {
    fn name(&self) -> &str {
        "语音转文字"
    }

    fn accepts(&self, target: &AcquisitionTarget) -> bool {
        matches!(target, AcquisitionTarget::Video(_))
    }

    fn is_configured(&self) -> bool {
        self.helper_url.is_some() && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    fn is_paid(&self) -> bool {
        true
    }

    fn time_budget(&self) -> Option<Duration> {
        // 轮询总时长再加一分钟用于解析音频地址和提交任务
        Some(
            self.poll_interval
                .saturating_mul(self.max_polls)
                .saturating_add(Duration::from_secs(60)),
        )
    }

    async fn fetch(
        &self,
        target: &AcquisitionTarget,
        cancel: &CancellationToken,
    ) -> Result<String, AcquisitionError> {
        let video = video_of(target)?;
        let audio_url = self.resolve_audio_url(video, cancel).await?;
        debug!("[转录] 已解析音频地址");

        let job: TranscriptJob = self
            .http
            .post_json(
                &join_url(&self.base_url, "v2/transcript"),
                &self.auth(),
                &TranscriptRequest {
                    audio_url: &audio_url,
                    speech_model: "universal",
                },
                cancel,
            )
            .await
            .map_err(|e| map_http(self.name(), e))?;
        let id = job
            .id
            .ok_or_else(|| AcquisitionError::unavailable(self.name(), "提交任务未返回 id"))?;
        info!("[转录] 📤 已提交语音转文字任务: {}", id);

        let poll_url = join_url(&self.base_url, &format!("v2/transcript/{}", id));
        for poll in 1..=self.max_polls {
            let job: TranscriptJob = self
                .http
                .get_json(&poll_url, &self.auth(), cancel)
                .await
                .map_err(|e| map_http(self.name(), e))?;
            match job.status.as_str() {
                "completed" => return Ok(job.text.unwrap_or_default()),
                "error" => {
                    return Err(AcquisitionError::unavailable(
                        self.name(),
                        job.error.unwrap_or_else(|| "转写失败".to_string()),
                    ))
                }
                status => debug!("[转录] 第 {} 次轮询，状态: {}", poll, status),
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(AcquisitionError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        Err(AcquisitionError::unavailable(
            self.name(),
            format!("轮询 {} 次后仍未完成", self.max_polls),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http() -> HttpExecutor {
        HttpExecutor::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://localhost:8000/", "/youtube-transcript"),
            "http://localhost:8000/youtube-transcript"
        );
    }

    #[test]
    fn test_configuration_gates() {
        assert!(!TranscriptServiceSource::new(http(), None).is_configured());
        assert!(!TranscriptServiceSource::new(http(), Some(" ".into())).is_configured());
        assert!(TranscriptServiceSource::new(http(), Some("http://localhost:8000".into())).is_configured());

        assert!(!CaptionFunctionSource::new(http(), Some("http://fn".into()), None).is_configured());

        let stt = SpeechToTextSource::new(
            http(),
            Some("http://localhost:8000".into()),
            "https://api.assemblyai.com",
            None,
            Duration::from_secs(3),
            10,
        );
        assert!(!stt.is_configured());
        assert!(stt.is_paid());
    }

    #[test]
    fn test_speech_budget_covers_polling() {
        let stt = SpeechToTextSource::new(
            http(),
            None,
            "https://api.assemblyai.com",
            Some("key".into()),
            Duration::from_secs(3),
            100,
        );
        assert!(stt.time_budget().unwrap() >= Duration::from_secs(300));
    }

    #[test]
    fn test_speech_budget_saturates_on_huge_config() {
        let stt = SpeechToTextSource::new(
            http(),
            None,
            "https://api.assemblyai.com",
            Some("key".into()),
            Duration::from_secs(u64::MAX / 2),
            u32::MAX,
        );
        assert_eq!(stt.time_budget(), Some(Duration::MAX));
    }

    #[test]
    fn test_transcript_job_shape() {
        let job: TranscriptJob =
            serde_json::from_str(r#"{"id":"abc","status":"queued","text":null}"#).unwrap();
        assert_eq!(job.id.as_deref(), Some("abc"));
        assert_eq!(job.status, "queued");

        let reply: AudioUrlReply = serde_json::from_str(r#"{"audioUrl":"https://a"}"#).unwrap();
        assert_eq!(reply.audio_url.as_deref(), Some("https://a"));
    }

    #[tokio::test]
    #[ignore] // 需要本地转录服务
    async fn test_transcript_service_live() {
        let source = TranscriptServiceSource::new(http(), Some("http://localhost:8000".into()));
        let target = AcquisitionTarget::Video(VideoRef::parse("dQw4w9WgXcQ").unwrap());
        let text = source.fetch(&target, &CancellationToken::new()).await.unwrap();
        println!("转录文本长度: {}", text.len());
    }
}
