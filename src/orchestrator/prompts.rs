//! 终端交互

use std::io::IsTerminal;

use async_trait::async_trait;
use dialoguer::Confirm;
use tracing::warn;

use crate::models::session::GenerationSession;
use crate::services::{AcquisitionTarget, CostConfirmation, FixedConfirmation};

/// 启动时是否恢复上次未完成的会话
#[async_trait]
pub trait ResumePrompt: Send + Sync {
    async fn offer_resume(&self, session: &GenerationSession) -> bool;
}

#[async_trait]
impl ResumePrompt for FixedConfirmation {
    async fn offer_resume(&self, _session: &GenerationSession) -> bool {
        self.0
    }
}

/// 基于 dialoguer 的确认提示
///
/// 没有终端时一律按"否"处理。
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompts;

impl TerminalPrompts {
    pub fn new() -> Self {
        Self
    }

    async fn ask(question: String) -> bool {
        if !std::io::stdin().is_terminal() {
            warn!("⚠️ 非交互环境，按「否」处理: {}", question);
            return false;
        }

        let answer = tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(question)
                .default(false)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                warn!("⚠️ 读取输入失败: {}", e);
                false
            }
            Err(e) => {
                warn!("⚠️ 提示线程异常: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl CostConfirmation for TerminalPrompts {
    async fn confirm_paid_transcription(&self, source_name: &str, target: &AcquisitionTarget) -> bool {
        Self::ask(format!(
            "免费字幕均不可用。是否使用付费的{}转写 {}？",
            source_name,
            target.describe()
        ))
        .await
    }
}

#[async_trait]
impl ResumePrompt for TerminalPrompts {
    async fn offer_resume(&self, session: &GenerationSession) -> bool {
        Self::ask(format!(
            "发现未完成的会话（{}，{}，{} 道题）。是否恢复？选「否」将放弃它",
            session.source.label,
            session.stage.label(),
            session.questions.len()
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::generation::{GenerationConfig, SourceDescriptor};

    #[test]
    fn test_fixed_answer_resume_prompt() {
        let session = GenerationSession::new(
            SourceDescriptor::text("custom_text", "abc"),
            GenerationConfig::default(),
        );
        assert!(tokio_test::block_on(FixedConfirmation(true).offer_resume(&session)));
        assert!(!tokio_test::block_on(FixedConfirmation(false).offer_resume(&session)));
    }
}
