//! 错误类型
//!
//! 每一层只暴露自己的错误枚举，`AppError` 负责把它们收拢到一起。
//! 单个来源 / 单个提供方的失败在本层内部消化（记录日志后尝试下一个），
//! 只有"全部失败"这一类终止性错误才会向上传递。

use thiserror::Error;

use crate::models::session::Stage;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 文本获取错误（视频转录 / 文档提取）
    #[error("文本获取失败: {0}")]
    Acquisition(#[from] AcquisitionError),
    /// 生成服务网关错误
    #[error("生成服务失败: {0}")]
    Gateway(#[from] GatewayError),
    /// 结构化数据提取错误
    #[error("解析 AI 响应失败: {0}")]
    Extraction(#[from] ExtractionError),
    /// 目标容量不足
    #[error("容量检查未通过: {0}")]
    Capacity(#[from] CapacityError),
    /// 会话状态错误
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 会话快照存储错误
    #[error("会话存储错误: {0}")]
    Store(#[from] StoreError),
    /// 内容仓库错误
    #[error("内容仓库错误: {0}")]
    Repository(#[from] RepositoryError),
}

/// 文本获取错误
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// 单个来源不可用（链内部消化，不直接展示给用户）
    #[error("来源 {source_name} 不可用: {reason}")]
    SourceUnavailable { source_name: String, reason: String },
    /// 用户拒绝使用付费转录
    #[error("用户拒绝使用付费转录服务")]
    UserDeclined,
    /// 所有来源均已失败
    #[error("所有文本来源均已失败 (尝试了 {attempted} 个)")]
    AllSourcesExhausted { attempted: usize },
    /// 无法识别的视频 / 文档引用
    #[error("无效的来源引用: {0}")]
    InvalidReference(String),
    /// 被取消
    #[error("文本获取已取消")]
    Cancelled,
}

/// 生成服务网关错误
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 该提供方未配置密钥（非致命，跳过）
    #[error("提供方 {provider} 未配置密钥")]
    CredentialMissing { provider: String },
    /// 该提供方请求失败（非致命，尝试下一个）
    #[error("提供方 {provider} 请求失败: {reason}")]
    RequestFailed { provider: String, reason: String },
    /// 所有提供方都被跳过或失败
    #[error("所有生成服务均不可用 (尝试 {attempted} 个, 跳过 {skipped} 个)")]
    Exhausted { attempted: usize, skipped: usize },
    /// 被取消
    #[error("生成请求已取消")]
    Cancelled,
}

/// 结构化数据提取错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// 响应中没有找到 JSON 数据
    #[error("响应中没有可用的题目数据")]
    NoPayload,
    /// JSON 格式错误且无法截断恢复
    #[error("响应格式错误: {0}")]
    Malformed(String),
    /// 校验后没有任何有效题目
    #[error("没有有效的题目 (丢弃 {dropped} 条, 跳过 {skipped} 行)")]
    EmptyResult { dropped: usize, skipped: usize },
}

/// 容量错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapacityError {
    /// 剩余空位不足
    #[error("{destination} 只剩 {remaining} 个空位，但要导入 {requested} 道题")]
    InsufficientSlots {
        destination: String,
        remaining: usize,
        requested: usize,
    },
}

/// 会话状态错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// 已有生成任务在进行中
    #[error("已有生成任务正在进行")]
    Busy,
    /// 非法的状态转换
    #[error("不允许从 {from:?} 转换到 {to:?}")]
    InvalidTransition { from: Stage, to: Stage },
    /// 当前阶段不允许审核操作
    #[error("当前阶段 {0:?} 不允许审核操作")]
    NotReviewable(Stage),
    /// 题目不存在
    #[error("题目不存在: {0}")]
    UnknownQuestion(String),
    /// 没有可提交的题目
    #[error("没有可提交的题目")]
    NothingToCommit,
    /// 生成配置无效
    #[error("生成配置无效: {0}")]
    InvalidConfig(String),
    /// 当前没有会话
    #[error("当前没有生成会话")]
    NoActiveSession,
    /// 题目无法写入仓库（正确答案为空或越界）
    #[error("题目 {id} 无法导入: {reason}")]
    InvalidQuestion { id: String, reason: String },
}

/// 会话快照存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 读写失败
    #[error("读写快照失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 快照内容损坏
    #[error("快照内容无法解析: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// 内容仓库错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// 请求失败
    #[error("仓库请求失败: {0}")]
    Request(#[from] HttpError),
    /// 响应内容不符合预期
    #[error("仓库返回了无法识别的响应: {0}")]
    BadResponse(String),
    /// 目标不存在
    #[error("目标不存在: {0}")]
    NotFound(String),
    /// 没有配置仓库地址
    #[error("未配置题库地址")]
    Unconfigured,
}

/// HTTP 调用错误（基础设施层）
#[derive(Debug, Error)]
pub enum HttpError {
    /// 非 2xx 响应
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// 网络层错误
    #[error("网络请求失败: {0}")]
    Transport(#[from] reqwest::Error),
    /// 超时
    #[error("请求超时")]
    Timeout,
    /// 被取消
    #[error("请求已取消")]
    Cancelled,
    /// 响应体解析失败
    #[error("响应体解析失败: {0}")]
    Decode(String),
}

// ========== 便捷构造函数 ==========

impl AcquisitionError {
    /// 创建单个来源失败错误
    pub fn unavailable(source_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        AcquisitionError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

impl GatewayError {
    /// 创建单个提供方请求失败错误
    pub fn request_failed(provider: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        GatewayError::RequestFailed {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
