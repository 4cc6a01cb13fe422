//! 提示词构造

use tracing::warn;

use crate::models::generation::{GenerationAction, GenerationConfig, OutputShape};
use crate::models::question::Difficulty;
use crate::services::csv_table::TEMPLATE_HEADER;

const JSON_TEMPLATE: &str = r#"[
  {
    "question": "...",
    "options": ["...", "...", "...", "..."],
    "correctAnswer": 0,
    "explanation": "...",
    "subject": "...",
    "topic": "...",
    "difficulty": "Easy | Medium | Hard",
    "marks": 4
  }
]"#;

/// 提示词构造器
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_source_chars: usize,
}

impl PromptBuilder {
    pub fn new(max_source_chars: usize) -> Self {
        Self {
            max_source_chars: max_source_chars.max(1),
        }
    }

    /// 根据生成配置、来源名称和来源文本构造提示词
    pub fn build(&self, config: &GenerationConfig, source_label: &str, source_text: &str) -> String {
        let action = match config.action {
            GenerationAction::GenerateNew => format!(
                "Generate {} multiple-choice questions.",
                config.question_count
            ),
            GenerationAction::GenerateVariants => format!(
                "Generate {} similar multiple-choice questions by varying numbers and wording while preserving the underlying concepts.",
                config.question_count
            ),
            GenerationAction::None => "perform the requested task.".to_string(),
        };

        let difficulty = match config.difficulty {
            Difficulty::Mixed => "a mix of Easy, Medium and Hard".to_string(),
            other => other.to_string(),
        };

        let preferred = match config.output_shape {
            OutputShape::Structured => "JSON (a single array, no prose outside it)",
            OutputShape::Tabular => "CSV (header row first, quote any field containing a comma)",
        };

        let mut prompt = String::new();
        prompt.push_str(&format!(
            "Based on the following content from \"{}\", {}\n",
            source_label, action
        ));
        prompt.push_str(
            "IMPORTANT: Always produce the final output in English, even if the source content is in another language. \
             Translate source concepts as needed, but keep all question text, options and explanations in English.\n",
        );
        prompt.push_str(
            "Write stand-alone questions. Do NOT reference the source with phrases like \"according to the text\", \
             \"from the passage\" or \"as per the transcript\". Ask each question directly.\n",
        );
        prompt.push_str(&format!("Target difficulty: {}.\n", difficulty));
        prompt.push_str(&format!("Preferred output: {}.\n", preferred));
        if let Some(extra) = config.custom_instruction() {
            prompt.push_str(&format!("Additional instructions: {}\n", extra));
        }

        prompt.push_str("\nIf using JSON, use this structure (correctAnswer is the 0-based index of the correct option):\n");
        prompt.push_str(JSON_TEMPLATE);
        prompt.push_str("\n\nIf using CSV, use this header:\n");
        prompt.push_str(&TEMPLATE_HEADER.join(","));
        prompt.push_str("\n\nContent:\n---\n");
        prompt.push_str(&self.clip(source_text));
        prompt.push_str("\n---\n");
        prompt
    }

    /// 按字符数截断来源文本
    fn clip(&self, text: &str) -> String {
        let total = text.chars().count();
        if total <= self.max_source_chars {
            return text.to_string();
        }
        warn!(
            "⚠️ 来源文本过长 ({} 字符)，只发送前 {} 字符",
            total, self.max_source_chars
        );
        text.chars().take(self.max_source_chars).collect()
    }
}
