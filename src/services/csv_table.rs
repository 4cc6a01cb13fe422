//! CSV 表格解析
//!
//! 模型返回的 CSV 往往没有表头、列名大小写不一，字段里还会带逗号，
//! 这里用一个支持引号的小状态机逐行解析。

use phf::phf_map;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::models::question::{Difficulty, GeneratedQuestion, DEFAULT_MARKS};
use crate::services::response_extractor::Extraction;

/// 没有表头时使用的固定列顺序
pub const TEMPLATE_HEADER: [&str; 11] = [
    "question",
    "option_a",
    "option_b",
    "option_c",
    "option_d",
    "correct_answer",
    "explanation",
    "subject",
    "topic",
    "difficulty",
    "marks",
];

/// 列名别名（归一化之后查表）
static HEADER_ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "question_text" => "question",
    "questiontext" => "question",
    "answer" => "correct_answer",
    "correct" => "correct_answer",
    "correctanswer" => "correct_answer",
    "correct_option" => "correct_answer",
    "answer_index" => "correct_answer",
    "solution" => "explanation",
    "reason" => "explanation",
    "chapter" => "topic",
    "level" => "difficulty",
    "mark" => "marks",
    "points" => "marks",
    "score" => "marks",
};

/// 列名归一化：去空白、小写、连续空白替换为 `_`，再查别名表
pub fn normalize_header(token: &str) -> String {
    let normalized = token
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    match HEADER_ALIASES.get(normalized.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => normalized,
    }
}

/// 按逗号切分一行，引号内的逗号不切分，`""` 还原为 `"`
pub fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            ('"', false) => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut current).trim().to_string()),
            (c, _) => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// 解析 CSV 文本（已去掉代码块外壳）
pub fn extract_tabular(body: &str) -> Result<Extraction, ExtractionError> {
    let lines: Vec<&str> = body
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect();

    let Some(first) = lines.first() else {
        return Err(ExtractionError::NoPayload);
    };

    let first_tokens: Vec<String> = split_row(first).iter().map(|t| normalize_header(t)).collect();
    let (header, data_rows) = if first_tokens.iter().any(|t| t == "question") {
        (first_tokens, &lines[1..])
    } else {
        debug!("[提取] CSV 没有表头，使用默认列顺序");
        (
            TEMPLATE_HEADER.iter().map(|h| h.to_string()).collect(),
            &lines[..],
        )
    };

    let mut questions = Vec::new();
    let mut dropped = 0;
    let mut skipped = 0;

    for (row_index, line) in data_rows.iter().enumerate() {
        let row = Row::new(&header, split_row(line));
        let question_text = row.get("question").unwrap_or_default().to_string();
        if question_text.is_empty() {
            skipped += 1;
            continue;
        }

        let question = GeneratedQuestion {
            id: format!("q-{}", questions.len() + 1),
            question_text,
            options: row.options(),
            correct_option_index: row
                .get("correct_answer")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            explanation: row.get("explanation").map(str::to_string),
            subject: row.get("subject").unwrap_or_default().to_string(),
            topic: row.get("topic").unwrap_or_default().to_string(),
            difficulty: row
                .get("difficulty")
                .map(Difficulty::parse_lenient)
                .unwrap_or_default(),
            marks: row
                .get("marks")
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|m| *m > 0)
                .unwrap_or(DEFAULT_MARKS),
        };

        match question.validate() {
            Ok(()) => questions.push(question),
            Err(reason) => {
                warn!("[提取] ⚠️ 丢弃 CSV 第 {} 行: {}", row_index + 1, reason);
                dropped += 1;
            }
        }
    }

    Ok(Extraction {
        questions,
        dropped,
        skipped,
    })
}

/// 一行数据，按表头位置取值
struct Row<'h> {
    header: &'h [String],
    cells: Vec<String>,
}

impl<'h> Row<'h> {
    fn new(header: &'h [String], cells: Vec<String>) -> Self {
        Self { header, cells }
    }

    /// 取某列的值，空字符串视为缺失
    fn get(&self, column: &str) -> Option<&str> {
        let position = self.header.iter().position(|h| h == column)?;
        self.cells
            .get(position)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// 所有 `option_*` 列（按表头顺序，去掉空单元格）
    fn options(&self) -> Vec<String> {
        self.header
            .iter()
            .zip(self.cells.iter())
            .filter(|(h, v)| h.starts_with("option_") && !v.is_empty())
            .map(|(_, v)| v.clone())
            .collect()
    }
}
