use serde::{Deserialize, Serialize};

/// 未给出分值时的默认分值
pub const DEFAULT_MARKS: u32 = 4;

/// 难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    /// 只用于生成配置，单道题目不会是 Mixed
    Mixed,
}

impl Difficulty {
    /// 宽松解析单道题目的难度：easy / hard 之外一律视为 Medium
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }

    /// 解析生成配置中的难度（支持 mixed）
    pub fn from_config_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            "mixed" => Some(Difficulty::Mixed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::Mixed => "Mixed",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI 生成的单道选择题
///
/// `id` 在提取时分配，只在当前会话内有效，之后不会再变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub id: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub marks: u32,
}

/// 题目校验失败的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidQuestion {
    EmptyText,
    TooFewOptions(usize),
    AnswerOutOfRange { index: usize, options: usize },
    ZeroMarks,
}

impl std::fmt::Display for InvalidQuestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidQuestion::EmptyText => write!(f, "题干为空"),
            InvalidQuestion::TooFewOptions(n) => write!(f, "选项数量不足 ({} < 2)", n),
            InvalidQuestion::AnswerOutOfRange { index, options } => {
                write!(f, "答案索引 {} 超出范围 [0, {})", index, options)
            }
            InvalidQuestion::ZeroMarks => write!(f, "分值必须为正数"),
        }
    }
}

impl GeneratedQuestion {
    /// 校验题目不变量
    ///
    /// 不合格的记录由调用方丢弃，这里不做任何修正。
    pub fn validate(&self) -> Result<(), InvalidQuestion> {
        if self.question_text.trim().is_empty() {
            return Err(InvalidQuestion::EmptyText);
        }
        if self.options.len() < 2 {
            return Err(InvalidQuestion::TooFewOptions(self.options.len()));
        }
        if self.correct_option_index >= self.options.len() {
            return Err(InvalidQuestion::AnswerOutOfRange {
                index: self.correct_option_index,
                options: self.options.len(),
            });
        }
        if self.marks == 0 {
            return Err(InvalidQuestion::ZeroMarks);
        }
        Ok(())
    }

    /// 正确选项的文本
    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_option_index).map(String::as_str)
    }
}

impl std::fmt::Display for GeneratedQuestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let preview = crate::utils::logging::truncate_text(&self.question_text, 80);
        write!(
            f,
            "[{}] {} ({} 个选项, 答案 {}, {} 分)",
            self.id,
            preview,
            self.options.len(),
            self.correct_option_index,
            self.marks
        )
    }
}
