//! # Question Forge
//!
//! 从粘贴的文本、PDF 或视频生成选择题，审核后导入题库
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（HTTP 客户端），只暴露能力
//! - `HttpExecutor` - 带超时和取消的 JSON / multipart 调用
//! - `bounded` - 给任意 future 加上时间上限和取消
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不持有会话
//! - `TranscriptAcquisitionChain` - 视频 / 文档 → 文本（逐个来源故障转移）
//! - `ProviderGateway` - 提示词 → 模型回复（按优先级故障转移）
//! - `StructuredResponseExtractor` - 模型回复 → 题目（JSON / CSV，容忍截断）
//! - `SessionStore` / `ContentRepository` - 快照和题库
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个会话"的完整流程
//! - `GenerationFlow` - 获取文本 → 生成 → 提取 → 审核 → 导入
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 装配依赖、恢复会话、分发命令
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{GeneratedQuestion, GenerationConfig, GenerationSession, SourceDescriptor, Stage};
pub use orchestrator::App;
pub use workflow::{FlowDeps, GenerationFlow};
