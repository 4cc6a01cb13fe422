//! 生成会话
//!
//! 会话只由流程层（`workflow::GenerationFlow`）修改；
//! 审核界面只能改动 `approved_ids` 和删除 `questions` 中的题目。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::models::generation::{GenerationConfig, SourceDescriptor};
use crate::models::question::GeneratedQuestion;

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Idle,
    AcquiringText,
    DispatchingToProvider,
    AwaitingProviderReply,
    ExtractingStructuredData,
    ReadyForReview,
    Committed,
}

impl Stage {
    /// 是否处于一次生成的中途
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Stage::AcquiringText
                | Stage::DispatchingToProvider
                | Stage::AwaitingProviderReply
                | Stage::ExtractingStructuredData
        )
    }

    /// 能否从这里开始一次新的生成
    pub fn can_start_run(&self) -> bool {
        matches!(self, Stage::Idle | Stage::ReadyForReview | Stage::Committed)
    }

    /// 状态转换表
    pub fn can_transition_to(&self, next: Stage) -> bool {
        use Stage::*;
        match (*self, next) {
            // 失败、取消或放弃：回到 Idle
            (from, Idle) => from != Idle,
            (from, AcquiringText) => from.can_start_run(),
            (from, DispatchingToProvider) => from.can_start_run() || from == AcquiringText,
            (DispatchingToProvider, AwaitingProviderReply) => true,
            (AwaitingProviderReply, ExtractingStructuredData) => true,
            (ExtractingStructuredData, ReadyForReview) => true,
            (ReadyForReview, Committed) => true,
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Idle => "空闲",
            Stage::AcquiringText => "获取文本",
            Stage::DispatchingToProvider => "发送请求",
            Stage::AwaitingProviderReply => "等待生成",
            Stage::ExtractingStructuredData => "解析结果",
            Stage::ReadyForReview => "待审核",
            Stage::Committed => "已导入",
        }
    }
}

/// 生成会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSession {
    pub config: GenerationConfig,
    pub source: SourceDescriptor,
    pub stage: Stage,
    pub progress_percent: u8,
    #[serde(default)]
    pub questions: Vec<GeneratedQuestion>,
    #[serde(default)]
    pub approved_ids: BTreeSet<String>,
}

impl GenerationSession {
    pub fn new(source: SourceDescriptor, config: GenerationConfig) -> Self {
        Self {
            config,
            source,
            stage: Stage::Idle,
            progress_percent: 0,
            questions: Vec::new(),
            approved_ids: BTreeSet::new(),
        }
    }

    /// 启动时是否应该提示用户恢复
    pub fn is_resumable(&self) -> bool {
        !matches!(self.stage, Stage::Idle | Stage::Committed)
    }

    /// 推进到下一阶段，进度只增不减
    pub fn advance(&mut self, next: Stage, progress: u8) -> Result<(), SessionError> {
        if !self.stage.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        self.progress_percent = self.progress_percent.max(progress.min(100));
        Ok(())
    }

    /// 同一阶段内推进进度（只增不减）
    pub fn bump_progress(&mut self, progress: u8) {
        self.progress_percent = self.progress_percent.max(progress.min(100));
    }

    /// 为新一轮生成清空上一轮的结果
    pub fn begin_run(&mut self) {
        self.questions.clear();
        self.approved_ids.clear();
        self.progress_percent = 0;
    }

    /// 回到 Idle：丢弃本轮产生的题目，保留来源和配置以便重试
    pub fn reset_to_idle(&mut self) {
        self.stage = Stage::Idle;
        self.progress_percent = 0;
        self.questions.clear();
        self.approved_ids.clear();
    }

    fn ensure_reviewable(&self) -> Result<(), SessionError> {
        if self.stage != Stage::ReadyForReview {
            return Err(SessionError::NotReviewable(self.stage));
        }
        Ok(())
    }

    fn ensure_known(&self, id: &str) -> Result<(), SessionError> {
        if self.questions.iter().any(|q| q.id == id) {
            Ok(())
        } else {
            Err(SessionError::UnknownQuestion(id.to_string()))
        }
    }

    /// 切换一道题的通过状态，返回切换后是否通过
    pub fn toggle_approval(&mut self, id: &str) -> Result<bool, SessionError> {
        self.ensure_reviewable()?;
        self.ensure_known(id)?;
        if self.approved_ids.remove(id) {
            Ok(false)
        } else {
            self.approved_ids.insert(id.to_string());
            Ok(true)
        }
    }

    /// 全部通过
    pub fn approve_all(&mut self) -> Result<usize, SessionError> {
        self.ensure_reviewable()?;
        self.approved_ids = self.questions.iter().map(|q| q.id.clone()).collect();
        Ok(self.approved_ids.len())
    }

    /// 删除一道题（同时取消其通过状态）
    pub fn remove_question(&mut self, id: &str) -> Result<GeneratedQuestion, SessionError> {
        self.ensure_reviewable()?;
        let position = self
            .questions
            .iter()
            .position(|q| q.id == id)
            .ok_or_else(|| SessionError::UnknownQuestion(id.to_string()))?;
        self.approved_ids.remove(id);
        Ok(self.questions.remove(position))
    }

    /// 将要提交的题目
    ///
    /// `approved_ids` 为空时视为全部通过。
    pub fn selection(&self) -> Vec<&GeneratedQuestion> {
        if self.approved_ids.is_empty() {
            self.questions.iter().collect()
        } else {
            self.questions
                .iter()
                .filter(|q| self.approved_ids.contains(&q.id))
                .collect()
        }
    }
}
