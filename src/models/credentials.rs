//! 生成服务提供方与密钥

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 生成服务提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    Groq,
    OpenRouter,
}

impl ProviderId {
    /// 默认优先级：Gemini → Groq → OpenRouter
    pub const DEFAULT_ORDER: [ProviderId; 3] =
        [ProviderId::Gemini, ProviderId::Groq, ProviderId::OpenRouter];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::Groq => "groq",
            ProviderId::OpenRouter => "openrouter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(ProviderId::Gemini),
            "groq" => Some(ProviderId::Groq),
            "openrouter" => Some(ProviderId::OpenRouter),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 提供方密钥集合（只读）
///
/// 没有配置（缺失、`None` 或空白）与配置了但无效是两回事：
/// 前者在网关中直接跳过，后者会发出请求并在失败后切换到下一个提供方。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentialSet {
    secrets: HashMap<ProviderId, Option<String>>,
}

impl ProviderCredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置某个提供方的密钥（`None` 表示显式未配置）
    pub fn with(mut self, provider: ProviderId, secret: Option<String>) -> Self {
        self.set(provider, secret);
        self
    }

    pub fn set(&mut self, provider: ProviderId, secret: Option<String>) {
        self.secrets.insert(provider, secret);
    }

    /// 用另一组密钥中已配置的项覆盖当前值
    pub fn overlay(&mut self, other: &ProviderCredentialSet) {
        for (provider, secret) in &other.secrets {
            if secret.as_deref().map(str::trim).is_some_and(|s| !s.is_empty()) {
                self.secrets.insert(*provider, secret.clone());
            }
        }
    }

    /// 取出可用的密钥；缺失或空白返回 `None`
    pub fn secret_for(&self, provider: ProviderId) -> Option<&str> {
        self.secrets
            .get(&provider)
            .and_then(|s| s.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn has(&self, provider: ProviderId) -> bool {
        self.secret_for(provider).is_some()
    }

    /// 已配置的提供方数量
    pub fn configured_count(&self) -> usize {
        self.secrets.keys().filter(|p| self.has(**p)).count()
    }
}
