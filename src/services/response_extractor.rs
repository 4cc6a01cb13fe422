//! 结构化数据提取 - 业务能力层
//!
//! 从模型的自由文本回复中提取题目，容忍以下情况：
//! - 回复前后夹杂说明文字
//! - 数据包在 ``` 代码块中（代码块可能没有闭合）
//! - JSON 在中途被截断
//!
//! 只负责"文本 → 题目"，不关心题目来自哪个提供方。

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::models::generation::OutputShape;
use crate::models::question::{Difficulty, GeneratedQuestion, DEFAULT_MARKS};
use crate::services::csv_table;
use crate::utils::logging::truncate_text;

/// 提取结果
///
/// 部分记录被丢弃不算失败，`dropped` / `skipped` 记录被丢掉的数量。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub questions: Vec<GeneratedQuestion>,
    /// 不满足题目约束而被丢弃的记录
    pub dropped: usize,
    /// 题干为空而被跳过的 CSV 行
    pub skipped: usize,
}

/// 结构化数据提取器（无状态）
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredResponseExtractor;

impl StructuredResponseExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 按期望的输出格式提取题目
    pub fn extract(
        &self,
        raw_reply: &str,
        shape: OutputShape,
    ) -> Result<Extraction, ExtractionError> {
        debug!(
            "[提取] 回复长度 {} 字符, 格式 {}",
            raw_reply.len(),
            shape.label()
        );
        let extraction = match shape {
            OutputShape::Structured => extract_structured(raw_reply)?,
            OutputShape::Tabular => csv_table::extract_tabular(fenced_body(raw_reply))?,
        };

        if extraction.questions.is_empty() {
            warn!(
                "[提取] ❌ 没有有效题目 (丢弃 {}, 跳过 {})",
                extraction.dropped, extraction.skipped
            );
            return Err(ExtractionError::EmptyResult {
                dropped: extraction.dropped,
                skipped: extraction.skipped,
            });
        }
        Ok(extraction)
    }
}

static FENCE_OPENING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[A-Za-z0-9_+-]*[ \t]*(?:\r?\n)?").expect("代码块正则无效")
});

/// 截断恢复最多尝试的截断点（从末尾往前）
const MAX_RECOVERY_ATTEMPTS: usize = 32;

/// 选出代码块内部的内容
///
/// - 有闭合的代码块：取其内部
/// - 只有开头没有结尾（回复被截断）：取开头之后的全部
/// - 没有代码块：原样返回
pub fn fenced_body(reply: &str) -> &str {
    let Some(open) = FENCE_OPENING.find(reply) else {
        return reply;
    };
    let rest = &reply[open.end()..];
    match rest.find("```") {
        Some(close) => &rest[..close],
        None => rest,
    }
}

fn extract_structured(reply: &str) -> Result<Extraction, ExtractionError> {
    let candidate = fenced_body(reply);
    let start = candidate
        .find(['[', '{'])
        .ok_or(ExtractionError::NoPayload)?;
    let candidate = &candidate[start..];

    let value = match serde_json::from_str::<JsonValue>(candidate) {
        Ok(value) => value,
        Err(strict_err) => {
            debug!("[提取] 严格解析失败: {}，尝试截断恢复", strict_err);
            recover_truncated(candidate).ok_or_else(|| {
                warn!(
                    "[提取] ❌ JSON 无法恢复: {}",
                    truncate_text(candidate, 120)
                );
                ExtractionError::Malformed(strict_err.to_string())
            })?
        }
    };

    let entries = match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut map) => match map.remove("questions") {
            Some(JsonValue::Array(items)) => items,
            _ => return Err(ExtractionError::NoPayload),
        },
        _ => return Err(ExtractionError::NoPayload),
    };

    let mut questions = Vec::with_capacity(entries.len());
    let mut dropped = 0;
    for (position, entry) in entries.iter().enumerate() {
        let id = format!("q-{}", questions.len() + 1);
        match question_from_json(entry, id) {
            Some(question) => match question.validate() {
                Ok(()) => questions.push(question),
                Err(reason) => {
                    warn!("[提取] ⚠️ 丢弃第 {} 条记录: {}", position + 1, reason);
                    dropped += 1;
                }
            },
            None => {
                warn!("[提取] ⚠️ 丢弃第 {} 条记录: 缺少答案", position + 1);
                dropped += 1;
            }
        }
    }

    Ok(Extraction {
        questions,
        dropped,
        skipped: 0,
    })
}

/// 截断恢复
///
/// 记录每个结构性的 `]` / `}` 以及此时仍未闭合的括号，
/// 从最后一个开始依次尝试"截到这里 + 补齐未闭合括号"，第一个能解析的前缀胜出。
/// 最多尝试 `MAX_RECOVERY_ATTEMPTS` 个截断点。
///
/// 未闭合的括号存成父指针链：每个截断点只记一个栈顶下标。
fn recover_truncated(candidate: &str) -> Option<JsonValue> {
    // (括号, 外层节点)
    let mut nodes: Vec<(u8, Option<usize>)> = Vec::new();
    let mut top: Option<usize> = None;
    let mut closers: Vec<(usize, Option<usize>)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, byte) in candidate.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                nodes.push((byte, top));
                top = Some(nodes.len() - 1);
            }
            b']' | b'}' => {
                if let Some(node) = top {
                    top = nodes[node].1;
                }
                closers.push((i + 1, top));
            }
            _ => {}
        }
    }

    for (end, still_open) in closers.iter().rev().take(MAX_RECOVERY_ATTEMPTS) {
        let mut attempt = String::with_capacity(end + 16);
        attempt.push_str(&candidate[..*end]);
        let mut current = *still_open;
        while let Some(node) = current {
            let (bracket, outer) = nodes[node];
            attempt.push(if bracket == b'[' { ']' } else { '}' });
            current = outer;
        }
        if let Ok(value) = serde_json::from_str::<JsonValue>(&attempt) {
            debug!("[提取] ✓ 截断恢复成功，保留前 {} 字节", end);
            return Some(value);
        }
    }
    None
}

fn first_field<'a>(entry: &'a JsonValue, names: &[&str]) -> Option<&'a JsonValue> {
    names
        .iter()
        .find_map(|name| entry.get(*name))
        .filter(|v| !v.is_null())
}

fn as_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_index(value: &JsonValue) -> Option<usize> {
    match value {
        JsonValue::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_marks(value: Option<&JsonValue>) -> u32 {
    let parsed = match value {
        Some(JsonValue::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(JsonValue::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|m| *m > 0).unwrap_or(DEFAULT_MARKS)
}

/// 宽松地把一条 JSON 记录转换为题目
///
/// 答案缺失或无法解析时返回 `None`；其余约束由 `validate` 检查。
fn question_from_json(entry: &JsonValue, id: String) -> Option<GeneratedQuestion> {
    if !entry.is_object() {
        return None;
    }

    let question_text = first_field(entry, &["question", "questionText", "text"])
        .and_then(as_text)
        .unwrap_or_default();
    let correct_option_index =
        first_field(entry, &["correctAnswer", "correct_answer", "answer"]).and_then(as_index)?;

    let options = entry
        .get("options")
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(as_text)
                .filter(|o| !o.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let text_field = |name: &str| {
        entry
            .get(name)
            .and_then(as_text)
            .filter(|s| !s.is_empty())
    };

    Some(GeneratedQuestion {
        id,
        question_text,
        options,
        correct_option_index,
        explanation: text_field("explanation"),
        subject: text_field("subject").unwrap_or_default(),
        topic: text_field("topic").unwrap_or_default(),
        difficulty: text_field("difficulty")
            .map(|d| Difficulty::parse_lenient(&d))
            .unwrap_or_default(),
        marks: as_marks(entry.get("marks")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(question: &str, answer: usize) -> String {
        format!(
            r#"{{"question":"{}","options":["A","B","C","D"],"correctAnswer":{},"explanation":"because","subject":"Physics","topic":"Motion","difficulty":"Easy","marks":4}}"#,
            question, answer
        )
    }

    fn extract(reply: &str) -> Result<Extraction, ExtractionError> {
        StructuredResponseExtractor::new().extract(reply, OutputShape::Structured)
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let reply = format!(
            "Here are your questions:\n```json\n[{}, {}]\n```\nLet me know if you need more.",
            entry("What is speed?", 1),
            entry("What is velocity?", 2)
        );
        let result = extract(&reply).unwrap();
        assert_eq!(result.questions.len(), 2);
        assert_eq!(result.questions[0].id, "q-1");
        assert_eq!(result.questions[1].id, "q-2");
        assert_eq!(result.questions[1].correct_option_index, 2);
        assert_eq!(result.questions[0].difficulty, Difficulty::Easy);
        assert_eq!(result.dropped, 0);
    }

    #[test]
    fn test_bare_json_with_leading_prose() {
        let reply = format!("Sure! [{}]", entry("Q1", 0));
        let result = extract(&reply).unwrap();
        assert_eq!(result.questions.len(), 1);
    }

    #[test]
    fn test_long_truncated_reply_recovers_every_complete_element() {
        let entries: Vec<String> = (0..2000).map(|i| entry(&format!("Q{}", i), i % 4)).collect();
        let reply = format!(
            "```json\n{{\"questions\": [{}, {{\"question\": \"cut off",
            entries.join(", ")
        );
        let result = extract(&reply).unwrap();
        assert_eq!(result.questions.len(), 2000);
        assert_eq!(result.questions[1999].id, "q-2000");
    }

    #[test]
    fn test_large_unrecoverable_reply_gives_up() {
        let noise = "{\"a\": [1, 2], \"b\": {\"c\": 3}} ".repeat(20_000);
        let reply = format!("[{} oops", noise);
        assert!(recover_truncated(&reply).is_none());
        assert!(matches!(
            extract(&reply),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn test_truncated_after_complete_elements() {
        let full = format!(
            "```json\n[{}, {}, {}",
            entry("Q1", 0),
            entry("Q2", 1),
            entry("Q3", 2)
        );
        // 截断在第 4 个元素的题干中间，且代码块没有闭合
        let reply = format!("{}, {{\"question\":\"What is the un", full);
        let result = extract(&reply).unwrap();
        assert_eq!(result.questions.len(), 3);
        assert_eq!(result.questions[2].question_text, "Q3");
    }

    #[test]
    fn test_truncated_inside_options_drops_partial_element() {
        let reply = format!(
            "[{}, {{\"question\":\"Partial\",\"options\":[\"x\",\"y\"],\"correctAn",
            entry("Q1", 0)
        );
        let result = extract(&reply).unwrap();
        assert_eq!(result.questions.len(), 1);
        assert_eq!(result.dropped, 1);
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        let reply = r#"[{"question":"Which set is [1, 2}?","options":["a]","b}"],"correctAnswer":1}, {"question":"cut"#;
        let result = extract(reply).unwrap();
        assert_eq!(result.questions.len(), 1);
        assert_eq!(result.questions[0].options, vec!["a]", "b}"]);
    }

    #[test]
    fn test_object_wrapper_with_questions_field() {
        let reply = format!(r#"{{"questions":[{}]}}"#, entry("Q1", 3));
        let result = extract(&reply).unwrap();
        assert_eq!(result.questions[0].correct_option_index, 3);
    }

    #[test]
    fn test_lenient_fields() {
        let reply = r#"[
            {"questionText":"  Trimmed?  ","options":["yes"," ","no", 42],"answer":"2","marks":0,"difficulty":"insane"},
            {"text":"No answer","options":["a","b"]}
        ]"#;
        let result = extract(reply).unwrap();
        assert_eq!(result.questions.len(), 1);
        assert_eq!(result.dropped, 1);

        let q = &result.questions[0];
        assert_eq!(q.question_text, "Trimmed?");
        assert_eq!(q.options, vec!["yes", "no", "42"]);
        assert_eq!(q.correct_option_index, 2);
        assert_eq!(q.marks, DEFAULT_MARKS);
        assert_eq!(q.difficulty, Difficulty::Medium);
        assert_eq!(q.explanation, None);
    }

    #[test]
    fn test_out_of_range_answer_dropped_and_ids_stay_dense() {
        let reply = format!("[{}, {}, {}]", entry("Q1", 0), entry("Bad", 9), entry("Q3", 1));
        let result = extract(&reply).unwrap();
        let ids: Vec<&str> = result.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q-1", "q-2"]);
        assert_eq!(result.questions[1].question_text, "Q3");
        assert_eq!(result.dropped, 1);
    }

    #[test]
    fn test_no_payload() {
        assert_eq!(
            extract("I could not generate questions for this content."),
            Err(ExtractionError::NoPayload)
        );
        assert_eq!(extract(r#"{"error":"quota"}"#), Err(ExtractionError::NoPayload));
    }

    #[test]
    fn test_unrecoverable_json_is_malformed() {
        assert!(matches!(extract("[[[ oops"), Err(ExtractionError::Malformed(_))));
    }

    #[test]
    fn test_all_entries_invalid_is_empty_result() {
        let reply = r#"[{"question":"only one option","options":["a"],"correctAnswer":0}]"#;
        assert_eq!(
            extract(reply),
            Err(ExtractionError::EmptyResult {
                dropped: 1,
                skipped: 0
            })
        );
    }

    #[test]
    fn test_fenced_body_variants() {
        assert_eq!(fenced_body("```\n[1]\n```"), "[1]\n");
        assert_eq!(fenced_body("pre ```csv\na,b"), "a,b");
        assert_eq!(fenced_body("no fence"), "no fence");
    }
}
