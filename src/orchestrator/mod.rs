//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责应用的装配和命令分发，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 合并密钥（密钥文件 ← 配置 ← 环境变量）
//! - 创建 HttpExecutor、快照存储、题库
//! - 启动时恢复会话（询问恢复 / 放弃）
//! - 把子命令交给 GenerationFlow
//!
//! ### `cli` - 命令行定义
//!
//! ### `prompts` - 终端确认（付费转录、恢复会话）
//!
//! ## 层次关系
//!
//! ```text
//! app (装配 + 命令分发)
//!     ↓
//! workflow::GenerationFlow (驱动一个会话)
//!     ↓
//! services (能力层：transcript / gateway / extractor / store / repository)
//!     ↓
//! infrastructure (基础设施：HttpExecutor / bounded)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源所有者**：只有编排层创建 HTTP 客户端和存储
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做装配和展示，不做具体业务判断

pub mod app;
pub mod cli;
pub mod prompts;

// 重新导出主要类型
pub use app::{App, RestoreOutcome};
pub use cli::{Cli, Commands};
pub use prompts::{ResumePrompt, TerminalPrompts};
