//! 日志工具模块
//!
//! 提供日志初始化以及格式化输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::session::GenerationSession;

/// 初始化 tracing 订阅者
///
/// 日志级别由 `RUST_LOG` 控制，默认 `info`；`verbose` 为 true 时默认 `debug`。
/// 重复调用是安全的（测试中会多次调用）。
pub fn init(verbose: bool) {
    let default_level = if verbose {
        "debug,question_forge=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `providers`: 已配置密钥的提供方数量
/// - `session_path`: 会话快照位置
pub fn log_startup(providers: usize, session_path: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - AI 出题模式");
    info!("⏰ 启动时间: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("🔑 已配置的生成服务: {} 个", providers);
    info!("💾 会话快照: {}", session_path);
    info!("{}", "=".repeat(60));
}

/// 记录一次生成的开始
pub fn log_run_start(session: &GenerationSession) {
    info!("\n{}", "─".repeat(60));
    info!(
        "[会话] 📄 来源: {} ({:?})",
        truncate_text(&session.source.label, 60),
        session.source.kind
    );
    info!(
        "[会话] ⚙️ {} 道题 / {} / 难度 {}",
        session.config.question_count,
        session.config.output_shape.label(),
        session.config.difficulty
    );
    info!("{}", "─".repeat(60));
}

/// 打印生成结果统计
pub fn log_extraction_summary(kept: usize, dropped: usize, skipped: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 生成完成");
    info!("{}", "=".repeat(60));
    info!("✅ 有效题目: {}", kept);
    if dropped > 0 {
        info!("⚠️ 丢弃的记录: {}", dropped);
    }
    if skipped > 0 {
        info!("⚠️ 跳过的空行: {}", skipped);
    }
    info!("{}", "=".repeat(60));
}

/// 打印导入结果
pub fn log_commit_summary(written: usize, destination: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📦 导入完成");
    info!("{}", "=".repeat(60));
    info!("✅ 已写入 {} 道题到 {}", written, destination);
    info!(
        "⏰ 完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("你好世界", 2), "你好...");
        assert_eq!(truncate_text("abc", 3), "abc");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
    }
}
