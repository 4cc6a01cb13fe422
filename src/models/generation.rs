//! 生成配置与来源描述

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::models::question::Difficulty;

/// 期望的输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputShape {
    /// JSON 数组
    #[default]
    Structured,
    /// CSV 表格
    Tabular,
}

impl OutputShape {
    pub fn label(&self) -> &'static str {
        match self {
            OutputShape::Structured => "JSON",
            OutputShape::Tabular => "CSV",
        }
    }
}

/// 生成动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationAction {
    /// 不附加动作指令，只使用自定义指令
    None,
    /// 生成新题
    #[default]
    GenerateNew,
    /// 基于原题生成变式题
    GenerateVariants,
}

/// 生成配置，一次生成开始后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub question_count: u32,
    pub output_shape: OutputShape,
    pub difficulty: Difficulty,
    pub action: GenerationAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instruction: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            question_count: 10,
            output_shape: OutputShape::Structured,
            difficulty: Difficulty::Mixed,
            action: GenerationAction::GenerateNew,
            custom_instruction: None,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.question_count == 0 {
            return Err(SessionError::InvalidConfig(
                "题目数量必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 去掉首尾空白后非空的自定义指令
    pub fn custom_instruction(&self) -> Option<&str> {
        self.custom_instruction
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// 来源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Text,
    Document,
    Video,
}

/// 来源描述
///
/// Document / Video 的 `raw_text` 只有在获取成功后才会被填充；
/// `reference` 保存文件路径或视频链接，恢复快照后可以据此重新获取。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub label: String,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl SourceDescriptor {
    /// 直接粘贴的文本
    pub fn text(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Text,
            label: label.into(),
            raw_text: text.into(),
            reference: None,
        }
    }

    /// PDF 文档
    pub fn document(path: impl Into<String>) -> Self {
        let path = path.into();
        let label = std::path::Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone());
        Self {
            kind: SourceKind::Document,
            label,
            raw_text: String::new(),
            reference: Some(path),
        }
    }

    /// 视频链接
    pub fn video(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            kind: SourceKind::Video,
            label: url.clone(),
            raw_text: String::new(),
            reference: Some(url),
        }
    }

    /// 是否还需要经过文本获取阶段
    pub fn needs_acquisition(&self) -> bool {
        self.kind != SourceKind::Text && self.raw_text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GenerationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.output_shape, OutputShape::Structured);
        assert_eq!(config.difficulty, Difficulty::Mixed);
    }

    #[test]
    fn test_zero_question_count_rejected() {
        let config = GenerationConfig {
            question_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_blank_custom_instruction_is_ignored() {
        let config = GenerationConfig {
            custom_instruction: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.custom_instruction(), None);
    }

    #[test]
    fn test_needs_acquisition() {
        assert!(!SourceDescriptor::text("custom_text", "abc").needs_acquisition());

        let mut doc = SourceDescriptor::document("/tmp/notes/chapter1.pdf");
        assert_eq!(doc.label, "chapter1.pdf");
        assert!(doc.needs_acquisition());

        doc.raw_text = "已提取的文本".to_string();
        assert!(!doc.needs_acquisition());
    }
}
