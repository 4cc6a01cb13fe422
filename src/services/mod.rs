//! 业务能力层（Services）
//!
//! 描述"我能做什么"，每个能力只处理一件事，不持有会话。
//!
//! - `transcript` - 视频 / 文档 → 文本
//! - `provider_gateway` + `providers` - 提示词 → 模型回复
//! - `response_extractor` + `csv_table` - 模型回复 → 题目
//! - `prompt` - 生成配置 + 来源 → 提示词
//! - `session_store` - 会话快照
//! - `content_repository` - 题目写入外部仓库

pub mod content_repository;
pub mod csv_table;
pub mod prompt;
pub mod provider_gateway;
pub mod providers;
pub mod response_extractor;
pub mod session_store;
pub mod transcript;

pub use content_repository::{
    ContentRepository, Destination, QuestionRecord, RestContentRepository, UnconfiguredRepository,
};
pub use prompt::PromptBuilder;
pub use provider_gateway::ProviderGateway;
pub use providers::{GenerationProvider, GeminiProvider, OpenAiCompatibleProvider};
pub use response_extractor::{Extraction, StructuredResponseExtractor};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use transcript::{
    AcquisitionTarget, CostConfirmation, FixedConfirmation, TranscriptAcquisitionChain,
    TranscriptSource, VideoRef,
};
