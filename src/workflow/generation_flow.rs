//! 生成流程 - 流程层
//!
//! 核心职责：驱动"一个会话"的完整生成流程
//!
//! 流程顺序：
//! 1. 获取文本（文本来源或已有文本时跳过）
//! 2. 构造提示词 → 网关（按优先级故障转移）
//! 3. 提取题目 → 待审核
//!
//! 会话的每次修改之后都整体写入一次快照。
//! 任一阶段失败都回到 Idle，保留来源、配置和已获取的文本。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{AppResult, SessionError};
use crate::models::generation::{GenerationConfig, SourceDescriptor, SourceKind};
use crate::models::session::{GenerationSession, Stage};
use crate::services::{
    AcquisitionTarget, ContentRepository, PromptBuilder, ProviderGateway, SessionStore,
    StructuredResponseExtractor, TranscriptAcquisitionChain,
};
use crate::utils::logging::{log_extraction_summary, log_run_start};

const PROGRESS_START: u8 = 5;
const PROGRESS_ACQUIRED: u8 = 30;
const PROGRESS_DISPATCH: u8 = 40;
const PROGRESS_REPLY: u8 = 70;
const PROGRESS_EXTRACTED: u8 = 90;
const PROGRESS_READY: u8 = 100;

/// "正在处理"标记
///
/// 不写入快照；由 [`ProcessingGuard`] 在一次生成期间持有。
#[derive(Debug, Clone, Default)]
pub struct ProcessingFlag(Arc<AtomicBool>);

impl ProcessingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 已被占用时返回 `None`
    pub fn try_acquire(&self) -> Option<ProcessingGuard> {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ProcessingGuard(self.0.clone()))
    }
}

/// 释放时清除标记（包括 future 被中途丢弃的情况）
#[derive(Debug)]
pub struct ProcessingGuard(Arc<AtomicBool>);

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 取消句柄
///
/// 每次生成拿到根令牌的一个子令牌：
/// - `cancel()` 只取消当前这一次生成
/// - `shutdown()` 取消根令牌，之后的生成也会立即被取消
#[derive(Debug, Clone)]
pub struct CancelHandle {
    root: CancellationToken,
    current: Arc<Mutex<CancellationToken>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let root = CancellationToken::new();
        let current = Arc::new(Mutex::new(root.child_token()));
        Self { root, current }
    }

    fn begin_run(&self) -> CancellationToken {
        let token = self.root.child_token();
        if let Ok(mut current) = self.current.lock() {
            *current = token.clone();
        }
        token
    }

    pub fn cancel(&self) {
        if let Ok(current) = self.current.lock() {
            current.cancel();
        }
    }

    pub fn shutdown(&self) {
        self.root.cancel();
    }
}

/// 流程依赖的能力
pub struct FlowDeps {
    pub chain: TranscriptAcquisitionChain,
    pub gateway: ProviderGateway,
    pub extractor: StructuredResponseExtractor,
    pub prompt: PromptBuilder,
    pub store: Arc<dyn SessionStore>,
    pub repository: Arc<dyn ContentRepository>,
}

/// 生成流程
///
/// - 会话的唯一修改者
/// - 各能力只接收和返回普通的值，不接触会话
pub struct GenerationFlow {
    pub(super) deps: FlowDeps,
    pub(super) session: Option<GenerationSession>,
    pub(super) processing: ProcessingFlag,
    cancel: CancelHandle,
}

impl GenerationFlow {
    pub fn new(deps: FlowDeps) -> Self {
        Self {
            deps,
            session: None,
            processing: ProcessingFlag::new(),
            cancel: CancelHandle::new(),
        }
    }

    pub fn session(&self) -> Option<&GenerationSession> {
        self.session.as_ref()
    }

    pub fn processing_flag(&self) -> ProcessingFlag {
        self.processing.clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_set()
    }

    /// 用新的来源和配置开始一次生成
    ///
    /// 如果当前有待审核的题目，它们会被丢弃。
    pub async fn start(
        &mut self,
        source: SourceDescriptor,
        config: GenerationConfig,
    ) -> AppResult<&GenerationSession> {
        config.validate()?;
        if source.kind == SourceKind::Text && source.raw_text.trim().is_empty() {
            return Err(SessionError::InvalidConfig("文本内容为空".to_string()).into());
        }
        self.ensure_not_busy()?;

        self.session = Some(GenerationSession::new(source, config));
        self.run().await
    }

    /// 用当前的来源和配置重新生成
    ///
    /// 已获取的文本会被保留，不会再次走获取阶段。
    pub async fn retry(&mut self) -> AppResult<&GenerationSession> {
        self.ensure_not_busy()?;
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        if session.stage.is_in_flight() {
            debug!("[会话] 从中断的阶段 {} 重新开始", session.stage.label());
            session.reset_to_idle();
        }
        self.run().await
    }

    /// 原样装入一份快照，不做任何处理
    pub fn install(&mut self, session: GenerationSession) -> Result<(), SessionError> {
        self.ensure_not_busy()?;
        self.session = Some(session);
        Ok(())
    }

    /// 接管启动时读到的快照，返回是否重新运行了一次生成
    ///
    /// - 待审核：原样保留
    /// - 停在生成中途：通过 `retry()` 重新运行
    pub async fn adopt_recovered(&mut self, recovered: GenerationSession) -> AppResult<bool> {
        let stage = recovered.stage;
        self.install(recovered)?;

        if stage.is_in_flight() {
            info!("[会话] 🔄 快照停在「{}」，重新运行", stage.label());
            self.retry().await?;
            return Ok(true);
        }
        debug!("[会话] 已恢复快照 ({})", stage.label());
        Ok(false)
    }

    /// 放弃当前会话并清除快照
    pub async fn dismiss(&mut self) -> AppResult<()> {
        self.ensure_not_busy()?;
        self.deps.store.clear().await?;
        self.session = None;
        info!("[会话] 🗑️ 已放弃当前会话");
        Ok(())
    }

    pub(super) fn ensure_not_busy(&self) -> Result<(), SessionError> {
        if self.processing.is_set() {
            return Err(SessionError::Busy);
        }
        Ok(())
    }

    /// 写入当前会话的快照
    pub(super) async fn persist(&self) -> AppResult<()> {
        if let Some(session) = &self.session {
            self.deps.store.save(session).await?;
        }
        Ok(())
    }

    async fn run(&mut self) -> AppResult<&GenerationSession> {
        let _guard = self.processing.try_acquire().ok_or(SessionError::Busy)?;
        let cancel = self.cancel.begin_run();

        if let Err(e) = self.drive(&cancel).await {
            error!("[会话] ❌ 生成失败: {}", e);
            self.fail().await;
            return Err(e);
        }
        self.session
            .as_ref()
            .ok_or_else(|| SessionError::NoActiveSession.into())
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> AppResult<()> {
        let Self { deps, session, .. } = self;
        let session = session.as_mut().ok_or(SessionError::NoActiveSession)?;

        if session.stage != Stage::Idle {
            session.advance(Stage::Idle, 0)?;
        }
        session.begin_run();
        session.bump_progress(PROGRESS_START);
        log_run_start(session);
        deps.store.save(session).await?;

        if session.source.needs_acquisition() {
            session.advance(Stage::AcquiringText, PROGRESS_START)?;
            deps.store.save(session).await?;

            let target = AcquisitionTarget::from_source(&session.source)?;
            session.source.raw_text = deps.chain.acquire(&target, cancel).await?;
            session.bump_progress(PROGRESS_ACQUIRED);
            deps.store.save(session).await?;
        } else if session.source.kind != SourceKind::Text {
            info!("[会话] 已有获取过的文本，跳过获取阶段");
        }

        session.advance(Stage::DispatchingToProvider, PROGRESS_DISPATCH)?;
        deps.store.save(session).await?;
        let prompt = deps.prompt.build(
            &session.config,
            &session.source.label,
            &session.source.raw_text,
        );

        session.advance(Stage::AwaitingProviderReply, PROGRESS_DISPATCH)?;
        deps.store.save(session).await?;
        let reply = deps.gateway.generate(&prompt, cancel).await?;

        session.advance(Stage::ExtractingStructuredData, PROGRESS_REPLY)?;
        deps.store.save(session).await?;
        let extraction = deps
            .extractor
            .extract(&reply, session.config.output_shape)?;
        log_extraction_summary(
            extraction.questions.len(),
            extraction.dropped,
            extraction.skipped,
        );
        session.questions = extraction.questions;
        session.bump_progress(PROGRESS_EXTRACTED);
        deps.store.save(session).await?;

        session.advance(Stage::ReadyForReview, PROGRESS_READY)?;
        deps.store.save(session).await?;
        info!("[会话] ✓ {} 道题待审核", session.questions.len());
        Ok(())
    }

    async fn fail(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.reset_to_idle();
        if let Err(e) = self.deps.store.save(session).await {
            warn!("[会话] ⚠️ 保存快照失败: {}", e);
        }
    }
}
