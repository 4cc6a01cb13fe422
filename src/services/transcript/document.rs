//! 文档文本来源

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AcquisitionError, HttpError};
use crate::infrastructure::HttpExecutor;
use crate::services::transcript::{normalize_page_breaks, AcquisitionTarget, DocumentRef, TranscriptSource};

fn document_of(target: &AcquisitionTarget) -> Result<&DocumentRef, AcquisitionError> {
    match target {
        AcquisitionTarget::Document(document) => Ok(document),
        AcquisitionTarget::Video(_) => Err(AcquisitionError::InvalidReference(target.describe())),
    }
}

#[derive(Debug, Deserialize)]
struct TextReply {
    #[serde(default)]
    text: Option<String>,
}

/// 托管 PDF 提取函数
///
/// `POST {functions}/extract-pdf`，multipart 字段 `file` → `{ text }`
pub struct ManagedPdfSource {
    http: HttpExecutor,
    functions_base: Option<String>,
    anon_key: Option<String>,
}

impl ManagedPdfSource {
    pub fn new(http: HttpExecutor, functions_base: Option<String>, anon_key: Option<String>) -> Self {
        Self {
            http,
            functions_base,
            anon_key,
        }
    }
}

#[async_trait]
impl TranscriptSource for ManagedPdfSource {
    fn name(&self) -> &str {
        "托管 PDF 提取"
    }

    fn accepts(&self, target: &AcquisitionTarget) -> bool {
        matches!(target, AcquisitionTarget::Document(_))
    }

    fn is_configured(&self) -> bool {
        self.functions_base.is_some() && self.anon_key.is_some()
    }

    async fn fetch(
        &self,
        target: &AcquisitionTarget,
        cancel: &CancellationToken,
    ) -> Result<String, AcquisitionError> {
        let document = document_of(target)?;
        let bytes = document.read_bytes().await?;
        let base = self.functions_base.as_deref().unwrap_or_default();
        let url = format!("{}/extract-pdf", base.trim_end_matches('/'));
        let key = self.anon_key.as_deref().unwrap_or_default();

        let reply: TextReply = self
            .http
            .post_file(
                &url,
                &[("Authorization", format!("Bearer {}", key))],
                &document.file_name(),
                bytes,
                cancel,
            )
            .await
            .map_err(|e| match e {
                HttpError::Cancelled => AcquisitionError::Cancelled,
                other => AcquisitionError::unavailable(self.name(), other),
            })?;

        Ok(normalize_page_breaks(&reply.text.unwrap_or_default()))
    }
}

/// 本地逐页提取
///
/// `pdf-extract` 是同步的 CPU 密集操作，放到阻塞线程池执行。
#[derive(Debug, Default)]
pub struct LocalPdfSource;

impl LocalPdfSource {
    pub fn new() -> Self {
        Self
    }
}

/// 同步提取所有页面，页面之间用换页符分隔
pub fn extract_pages(bytes: &[u8]) -> Result<String, String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())?;
    debug!("[转录] 本地提取完成，共 {} 页", pages.len());
    Ok(pages.join("\u{000C}"))
}

#[async_trait]
impl TranscriptSource for LocalPdfSource {
    fn name(&self) -> &str {
        "本地 PDF 提取"
    }

    fn accepts(&self, target: &AcquisitionTarget) -> bool {
        matches!(target, AcquisitionTarget::Document(_))
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn fetch(
        &self,
        target: &AcquisitionTarget,
        _cancel: &CancellationToken,
    ) -> Result<String, AcquisitionError> {
        let document = document_of(target)?;
        let bytes = document.read_bytes().await?;

        let text = tokio::task::spawn_blocking(move || extract_pages(&bytes))
            .await
            .map_err(|e| AcquisitionError::unavailable(self.name(), e))?
            .map_err(|e| AcquisitionError::unavailable(self.name(), e))?;

        Ok(normalize_page_breaks(&text))
    }
}
