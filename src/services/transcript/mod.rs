//! 文本获取链 - 业务能力层
//!
//! 视频 / 文档 → 纯文本。按顺序尝试一组来源：
//! - 未配置的来源直接跳过，不算一次尝试
//! - 单个来源失败（非 2xx、网络错误、响应异常、空文本、超时）只记一条 warn，继续下一个
//! - 付费来源在调用前必须经过用户确认，用户拒绝则整个获取失败
//! - 取消立即终止整条链

pub mod document;
pub mod video;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AcquisitionError;
use crate::infrastructure::{bounded, HttpExecutor, Interrupted};
use crate::models::generation::{SourceDescriptor, SourceKind};

pub use document::{LocalPdfSource, ManagedPdfSource};
pub use video::{CaptionFunctionSource, SpeechToTextSource, TranscriptServiceSource};

/// 视频引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub video_id: String,
}

impl VideoRef {
    /// 解析视频链接或 11 位视频 ID
    ///
    /// 支持 `youtube.com/watch?v=`、`/embed/`、`/shorts/`、`youtu.be/` 以及裸 ID。
    pub fn parse(input: &str) -> Result<Self, AcquisitionError> {
        let input = input.trim();
        let invalid = || AcquisitionError::InvalidReference(input.to_string());

        if is_video_id(input) {
            return Ok(Self {
                video_id: input.to_string(),
            });
        }

        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };
        let url = Url::parse(&with_scheme).map_err(|_| invalid())?;
        let host = url.host_str().unwrap_or_default().to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        let host = host.strip_prefix("m.").unwrap_or(host);

        let candidate = match host {
            "youtu.be" => url
                .path_segments()
                .and_then(|mut s| s.next())
                .map(str::to_string),
            "youtube.com" | "youtube-nocookie.com" | "music.youtube.com" => {
                let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
                match segments.as_slice() {
                    ["watch", ..] => url
                        .query_pairs()
                        .find(|(k, _)| k == "v")
                        .map(|(_, v)| v.to_string()),
                    ["embed", id, ..] | ["shorts", id, ..] | ["live", id, ..] => Some(id.to_string()),
                    _ => None,
                }
            }
            _ => None,
        };

        candidate
            .filter(|id| is_video_id(id))
            .map(|video_id| Self { video_id })
            .ok_or_else(invalid)
    }

    /// 规范化的观看链接
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

fn is_video_id(value: &str) -> bool {
    value.len() == 11
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 文档引用（本地 PDF 文件）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub path: PathBuf,
}

impl DocumentRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string())
    }

    /// 读取文件内容
    pub async fn read_bytes(&self) -> Result<Vec<u8>, AcquisitionError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| AcquisitionError::unavailable("文件读取", format!("{}: {}", self.path.display(), e)))
    }
}

/// 获取目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionTarget {
    Video(VideoRef),
    Document(DocumentRef),
}

impl AcquisitionTarget {
    /// 根据来源描述构造获取目标（文本来源不需要获取）
    pub fn from_source(source: &SourceDescriptor) -> Result<Self, AcquisitionError> {
        let reference = source
            .reference
            .as_deref()
            .ok_or_else(|| AcquisitionError::InvalidReference(source.label.clone()))?;
        match source.kind {
            SourceKind::Video => Ok(AcquisitionTarget::Video(VideoRef::parse(reference)?)),
            SourceKind::Document => Ok(AcquisitionTarget::Document(DocumentRef::new(Path::new(
                reference,
            )))),
            SourceKind::Text => Err(AcquisitionError::InvalidReference(source.label.clone())),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AcquisitionTarget::Video(v) => format!("视频 {}", v.video_id),
            AcquisitionTarget::Document(d) => format!("文档 {}", d.file_name()),
        }
    }
}

/// 单个文本来源
///
/// 链只通过这个接口认识来源，新增来源不需要改动链本身。
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// 来源名称（用于日志）
    fn name(&self) -> &str;

    /// 是否处理这类目标
    fn accepts(&self, target: &AcquisitionTarget) -> bool;

    /// 是否已配置（未配置直接跳过）
    fn is_configured(&self) -> bool;

    /// 是否产生费用（调用前需要用户确认）
    fn is_paid(&self) -> bool {
        false
    }

    /// 单次尝试的时间上限；`None` 使用链的默认值
    fn time_budget(&self) -> Option<Duration> {
        None
    }

    async fn fetch(
        &self,
        target: &AcquisitionTarget,
        cancel: &CancellationToken,
    ) -> Result<String, AcquisitionError>;
}

/// 付费转录确认
#[async_trait]
pub trait CostConfirmation: Send + Sync {
    async fn confirm_paid_transcription(&self, source_name: &str, target: &AcquisitionTarget)
        -> bool;
}

/// 固定答复的确认器（非交互环境 / 测试）
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirmation(pub bool);

#[async_trait]
impl CostConfirmation for FixedConfirmation {
    async fn confirm_paid_transcription(&self, source_name: &str, _target: &AcquisitionTarget) -> bool {
        debug!("[转录] 付费来源 {} 自动{}", source_name, if self.0 { "确认" } else { "拒绝" });
        self.0
    }
}

/// 文本获取链
pub struct TranscriptAcquisitionChain {
    sources: Vec<Box<dyn TranscriptSource>>,
    confirmation: Arc<dyn CostConfirmation>,
    attempt_timeout: Duration,
}

impl TranscriptAcquisitionChain {
    pub fn new(
        sources: Vec<Box<dyn TranscriptSource>>,
        confirmation: Arc<dyn CostConfirmation>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            sources,
            confirmation,
            attempt_timeout,
        }
    }

    /// 标准来源顺序
    ///
    /// 视频：转录服务 → 字幕函数 → 语音转文字（付费）
    /// 文档：托管 PDF 函数 → 本地提取
    pub fn from_config(
        config: &Config,
        http: HttpExecutor,
        confirmation: Arc<dyn CostConfirmation>,
    ) -> Self {
        let sources: Vec<Box<dyn TranscriptSource>> = vec![
            Box::new(TranscriptServiceSource::new(
                http.clone(),
                config.transcript_service_url.clone(),
            )),
            Box::new(CaptionFunctionSource::new(
                http.clone(),
                config.functions_base_url.clone(),
                config.functions_anon_key.clone(),
            )),
            Box::new(SpeechToTextSource::from_config(http.clone(), config)),
            Box::new(ManagedPdfSource::new(
                http,
                config.functions_base_url.clone(),
                config.functions_anon_key.clone(),
            )),
            Box::new(LocalPdfSource::new()),
        ];
        Self::new(sources, confirmation, config.attempt_timeout())
    }

    /// 按顺序尝试各来源，返回第一个非空文本
    pub async fn acquire(
        &self,
        target: &AcquisitionTarget,
        cancel: &CancellationToken,
    ) -> Result<String, AcquisitionError> {
        info!("[转录] 🔍 开始获取文本: {}", target.describe());
        let mut attempted = 0;

        for source in &self.sources {
            if !source.accepts(target) {
                continue;
            }
            if !source.is_configured() {
                debug!("[转录] 跳过未配置的来源: {}", source.name());
                continue;
            }
            if cancel.is_cancelled() {
                return Err(AcquisitionError::Cancelled);
            }

            if source.is_paid() {
                let confirmed = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AcquisitionError::Cancelled),
                    confirmed = self.confirmation.confirm_paid_transcription(source.name(), target) => confirmed,
                };
                if !confirmed {
                    warn!("[转录] ⚠️ 用户拒绝使用付费来源: {}", source.name());
                    return Err(AcquisitionError::UserDeclined);
                }
            }

            attempted += 1;
            let budget = source.time_budget().unwrap_or(self.attempt_timeout);
            match bounded(cancel, budget, source.fetch(target, cancel)).await {
                Err(Interrupted::Cancelled) | Ok(Err(AcquisitionError::Cancelled)) => {
                    info!("[转录] 已取消");
                    return Err(AcquisitionError::Cancelled);
                }
                Err(Interrupted::TimedOut) => {
                    warn!("[转录] ⚠️ {} 超时 ({:?})", source.name(), budget);
                }
                Ok(Err(e)) => {
                    warn!("[转录] ⚠️ {} 失败: {}", source.name(), e);
                }
                Ok(Ok(text)) if text.trim().is_empty() => {
                    warn!("[转录] ⚠️ {} 返回了空文本", source.name());
                }
                Ok(Ok(text)) => {
                    let text = text.trim().to_string();
                    info!(
                        "[转录] ✓ {} 获取成功，共 {} 字符",
                        source.name(),
                        text.chars().count()
                    );
                    return Ok(text);
                }
            }
        }

        warn!("[转录] ❌ 所有来源均已失败 (尝试了 {} 个)", attempted);
        Err(AcquisitionError::AllSourcesExhausted { attempted })
    }
}

/// 整理分页文本
///
/// - 换页符 → 换行
/// - 去掉每行末尾空白
/// - 连续空行合并为一个换行
/// - 去掉首尾空白
pub fn normalize_page_breaks(text: &str) -> String {
    text.replace('\u{000C}', "\n")
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
