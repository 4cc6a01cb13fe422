use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::credentials::{ProviderCredentialSet, ProviderId};

/// 默认配置文件名（位于当前目录时自动加载）
pub const DEFAULT_CONFIG_FILE: &str = "question_forge.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 转录来源 ---
    /// 独立转录服务地址（未配置则跳过）
    pub transcript_service_url: Option<String>,
    /// 托管函数根地址（字幕提取、PDF 提取）
    pub functions_base_url: Option<String>,
    /// 托管函数匿名密钥
    pub functions_anon_key: Option<String>,
    /// 音频地址解析服务
    pub audio_helper_url: Option<String>,
    /// 语音转文字服务地址
    pub speech_to_text_base_url: String,
    /// 语音转文字服务密钥（付费）
    pub speech_to_text_api_key: Option<String>,
    /// 语音转文字轮询间隔（秒）
    pub speech_poll_interval_secs: u64,
    /// 语音转文字最多轮询次数
    pub speech_max_polls: u32,

    // --- 生成服务 ---
    /// 提供方优先级
    pub provider_order: Vec<String>,
    pub gemini_api_base_url: String,
    pub gemini_model_name: String,
    pub gemini_api_key: Option<String>,
    pub groq_api_base_url: String,
    pub groq_model_name: String,
    pub groq_api_key: Option<String>,
    pub openrouter_api_base_url: String,
    pub openrouter_model_name: String,
    pub openrouter_api_key: Option<String>,
    /// 独立的密钥文件（可选）
    pub credentials_file: Option<PathBuf>,
    /// 发送给模型的来源文本最大字符数
    pub max_source_chars: usize,

    // --- 超时 ---
    /// 单次 HTTP 请求超时（秒）
    pub http_timeout_secs: u64,
    /// 单个来源 / 单个提供方的尝试超时（秒）
    pub attempt_timeout_secs: u64,

    // --- 会话快照 ---
    /// 快照目录
    pub session_dir: PathBuf,
    /// 快照键名
    pub session_key: String,

    // --- 题库 ---
    pub repository_url: Option<String>,
    pub repository_api_key: Option<String>,

    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcript_service_url: None,
            functions_base_url: None,
            functions_anon_key: None,
            audio_helper_url: Some("http://localhost:8000".to_string()),
            speech_to_text_base_url: "https://api.assemblyai.com".to_string(),
            speech_to_text_api_key: None,
            speech_poll_interval_secs: 3,
            speech_max_polls: 200,
            provider_order: ProviderId::DEFAULT_ORDER
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            gemini_api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_model_name: "gemini-2.5-flash".to_string(),
            gemini_api_key: None,
            groq_api_base_url: "https://api.groq.com/openai/v1".to_string(),
            groq_model_name: "llama-3.1-8b-instant".to_string(),
            groq_api_key: None,
            openrouter_api_base_url: "https://openrouter.ai/api/v1".to_string(),
            openrouter_model_name: "qwen/qwen-2.5-72b-instruct:free".to_string(),
            openrouter_api_key: None,
            credentials_file: None,
            max_source_chars: 50_000,
            http_timeout_secs: 90,
            attempt_timeout_secs: 60,
            session_dir: PathBuf::from(".question_forge"),
            session_key: "ai-tools-state-v1".to_string(),
            repository_url: None,
            repository_api_key: None,
            verbose_logging: false,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// 从 TOML 文件加载（缺失的字段使用默认值）
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;
        Ok(config)
    }

    /// 默认值 ← 配置文件 ← 环境变量
    ///
    /// 配置文件路径来自 `QF_CONFIG`，否则尝试当前目录下的 `question_forge.toml`。
    pub fn load() -> anyhow::Result<Self> {
        let path = env_string("QF_CONFIG")
            .map(PathBuf::from)
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            });

        let base = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        Ok(base.overlay_env())
    }

    fn overlay_env(self) -> Self {
        let d = self;
        Self {
            transcript_service_url: env_string("QF_TRANSCRIPT_SERVICE_URL").or(d.transcript_service_url),
            functions_base_url: env_string("QF_FUNCTIONS_BASE_URL").or(d.functions_base_url),
            functions_anon_key: env_string("QF_FUNCTIONS_ANON_KEY").or(d.functions_anon_key),
            audio_helper_url: env_string("QF_AUDIO_HELPER_URL").or(d.audio_helper_url),
            speech_to_text_base_url: env_string("QF_SPEECH_TO_TEXT_BASE_URL").unwrap_or(d.speech_to_text_base_url),
            speech_to_text_api_key: env_string("ASSEMBLYAI_API_KEY").or(d.speech_to_text_api_key),
            speech_poll_interval_secs: env_parse("QF_SPEECH_POLL_INTERVAL_SECS").unwrap_or(d.speech_poll_interval_secs),
            speech_max_polls: env_parse("QF_SPEECH_MAX_POLLS").unwrap_or(d.speech_max_polls),
            provider_order: env_string("QF_PROVIDER_ORDER")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(d.provider_order),
            gemini_api_base_url: env_string("QF_GEMINI_API_BASE_URL").unwrap_or(d.gemini_api_base_url),
            gemini_model_name: env_string("QF_GEMINI_MODEL_NAME").unwrap_or(d.gemini_model_name),
            gemini_api_key: env_string("GEMINI_API_KEY").or(d.gemini_api_key),
            groq_api_base_url: env_string("QF_GROQ_API_BASE_URL").unwrap_or(d.groq_api_base_url),
            groq_model_name: env_string("QF_GROQ_MODEL_NAME").unwrap_or(d.groq_model_name),
            groq_api_key: env_string("GROQ_API_KEY").or(d.groq_api_key),
            openrouter_api_base_url: env_string("QF_OPENROUTER_API_BASE_URL").unwrap_or(d.openrouter_api_base_url),
            openrouter_model_name: env_string("QF_OPENROUTER_MODEL_NAME").unwrap_or(d.openrouter_model_name),
            openrouter_api_key: env_string("OPENROUTER_API_KEY").or(d.openrouter_api_key),
            credentials_file: env_string("QF_CREDENTIALS_FILE").map(PathBuf::from).or(d.credentials_file),
            max_source_chars: env_parse("QF_MAX_SOURCE_CHARS").unwrap_or(d.max_source_chars),
            http_timeout_secs: env_parse("QF_HTTP_TIMEOUT_SECS").unwrap_or(d.http_timeout_secs),
            attempt_timeout_secs: env_parse("QF_ATTEMPT_TIMEOUT_SECS").unwrap_or(d.attempt_timeout_secs),
            session_dir: env_string("QF_SESSION_DIR").map(PathBuf::from).unwrap_or(d.session_dir),
            session_key: env_string("QF_SESSION_KEY").unwrap_or(d.session_key),
            repository_url: env_string("QF_REPOSITORY_URL").or(d.repository_url),
            repository_api_key: env_string("QF_REPOSITORY_API_KEY").or(d.repository_api_key),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(d.verbose_logging),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs.max(1))
    }

    /// 配置中的提供方优先级，无法识别的名称被忽略
    pub fn provider_priority(&self) -> Vec<ProviderId> {
        let mut order = Vec::new();
        for name in &self.provider_order {
            match ProviderId::parse(name) {
                Some(id) if !order.contains(&id) => order.push(id),
                Some(_) => {}
                None => tracing::warn!("忽略未知的提供方: {}", name),
            }
        }
        if order.is_empty() {
            order.extend(ProviderId::DEFAULT_ORDER);
        }
        order
    }

    /// 配置文件 / 环境变量中直接给出的密钥
    pub fn inline_credentials(&self) -> ProviderCredentialSet {
        ProviderCredentialSet::new()
            .with(ProviderId::Gemini, self.gemini_api_key.clone())
            .with(ProviderId::Groq, self.groq_api_key.clone())
            .with(ProviderId::OpenRouter, self.openrouter_api_key.clone())
    }
}
