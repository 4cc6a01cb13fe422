//! 审核与导入
//!
//! 只允许在 ReadyForReview 阶段进行；每次修改后写入快照。

use tracing::{info, warn};

use crate::error::{AppResult, CapacityError, SessionError};
use crate::models::session::Stage;
use crate::services::{Destination, QuestionRecord};
use crate::utils::logging::log_commit_summary;
use crate::workflow::generation_flow::GenerationFlow;

impl GenerationFlow {
    /// 切换一道题的通过状态，返回切换后是否通过
    pub async fn toggle_approval(&mut self, id: &str) -> AppResult<bool> {
        self.ensure_not_busy()?;
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        let approved = session.toggle_approval(id)?;
        self.persist().await?;
        Ok(approved)
    }

    pub async fn approve_all(&mut self) -> AppResult<usize> {
        self.ensure_not_busy()?;
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        let count = session.approve_all()?;
        self.persist().await?;
        Ok(count)
    }

    pub async fn remove_question(&mut self, id: &str) -> AppResult<()> {
        self.ensure_not_busy()?;
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        let removed = session.remove_question(id)?;
        info!("[会话] 已删除题目 {}", removed.id);
        self.persist().await?;
        Ok(())
    }

    /// 把选中的题目导入目标，返回写入的数量
    ///
    /// 没有任何题目被标记通过时视为全部通过。
    /// 容量不足或仓库失败时会话保持在待审核状态。
    pub async fn commit(&mut self, destination: &Destination) -> AppResult<usize> {
        self.ensure_not_busy()?;
        let Self { deps, session, .. } = self;
        let session = session.as_mut().ok_or(SessionError::NoActiveSession)?;
        if session.stage != Stage::ReadyForReview {
            return Err(SessionError::NotReviewable(session.stage).into());
        }

        let records: Vec<QuestionRecord> = session
            .selection()
            .into_iter()
            .map(|q| QuestionRecord::from_question(q, destination))
            .collect::<Result<_, _>>()?;
        if records.is_empty() {
            return Err(SessionError::NothingToCommit.into());
        }

        let remaining = deps.repository.check_capacity(destination).await?;
        if remaining < records.len() {
            warn!(
                "[仓库] ⚠️ {} 剩余 {} 个空位，不足以导入 {} 道题",
                destination,
                remaining,
                records.len()
            );
            return Err(CapacityError::InsufficientSlots {
                destination: destination.to_string(),
                remaining,
                requested: records.len(),
            }
            .into());
        }

        let written = deps.repository.commit(destination, &records).await?;

        session.advance(Stage::Committed, 100)?;
        if let Err(e) = deps.store.clear().await {
            warn!("[会话] ⚠️ 清除快照失败: {}", e);
        }
        session.questions.clear();
        session.approved_ids.clear();

        log_commit_summary(written, &destination.to_string());
        Ok(written)
    }
}
