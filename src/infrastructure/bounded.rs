//! 带超时与取消的 future 包装

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// 被打断的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    TimedOut,
    Cancelled,
}

/// 在 `limit` 时间内运行 `fut`，`cancel` 被触发时立即放弃
///
/// 已经取消的 token 不会再去轮询 `fut`。
pub async fn bounded<F, T>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: F,
) -> Result<T, Interrupted>
where
    F: Future<Output = T>,
{
    if cancel.is_cancelled() {
        return Err(Interrupted::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        result = tokio::time::timeout(limit, fut) => result.map_err(|_| Interrupted::TimedOut),
    }
}
