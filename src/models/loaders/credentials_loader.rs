use crate::models::credentials::{ProviderCredentialSet, ProviderId};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// 密钥文件格式
///
/// ```toml
/// [credentials]
/// gemini = "..."
/// groq = ""
/// openrouter = "..."
/// ```
#[derive(Debug, Default, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    credentials: BTreeMap<String, Option<String>>,
}

/// 从 TOML 文本解析提供方密钥
///
/// 不认识的提供方名称只记录警告，不视为错误。
pub fn parse_credentials(content: &str) -> Result<ProviderCredentialSet> {
    let file: CredentialsFile = toml::from_str(content).context("无法解析密钥文件")?;

    let mut set = ProviderCredentialSet::new();
    for (name, secret) in file.credentials {
        match ProviderId::parse(&name) {
            Some(provider) => set.set(provider, secret),
            None => tracing::warn!("密钥文件中有未知的提供方: {}", name),
        }
    }
    Ok(set)
}

/// 从 TOML 文件加载提供方密钥
pub async fn load_credentials(path: &Path) -> Result<ProviderCredentialSet> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取密钥文件: {}", path.display()))?;

    let set = parse_credentials(&content)
        .with_context(|| format!("密钥文件内容无效: {}", path.display()))?;

    tracing::info!(
        "已加载密钥文件 {} (已配置 {} 个提供方)",
        path.file_name().unwrap_or_default().to_string_lossy(),
        set.configured_count()
    );

    Ok(set)
}
