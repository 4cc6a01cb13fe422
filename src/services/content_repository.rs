//! 内容仓库（题目最终写入的试卷 / 测试）
//!
//! 仓库本身在外部，这里只定义接口和一个 PostgREST 风格的实现。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{RepositoryError, SessionError};
use crate::infrastructure::HttpExecutor;
use crate::models::question::{Difficulty, GeneratedQuestion, DEFAULT_MARKS};

/// 导入目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Paper { paper_id: String },
    Test { test_id: String },
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Paper { paper_id } => write!(f, "试卷 {}", paper_id),
            Destination::Test { test_id } => write!(f, "测试 {}", test_id),
        }
    }
}

/// 写入仓库的一行题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionRecord {
    pub paper_id: Option<String>,
    pub test_id: Option<String>,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: Option<String>,
    pub difficulty: String,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub marks: u32,
}

impl QuestionRecord {
    /// 空白选项会被去掉，正确答案的下标随之平移。
    /// 正确答案本身为空或越界时拒绝。
    pub fn from_question(
        question: &GeneratedQuestion,
        destination: &Destination,
    ) -> Result<Self, SessionError> {
        let invalid = |reason: &str| SessionError::InvalidQuestion {
            id: question.id.clone(),
            reason: reason.to_string(),
        };
        let answer = question
            .options
            .get(question.correct_option_index)
            .ok_or_else(|| invalid("正确答案下标越界"))?;
        if answer.trim().is_empty() {
            return Err(invalid("正确答案为空"));
        }
        let correct_answer = question.options[..question.correct_option_index]
            .iter()
            .filter(|o| !o.trim().is_empty())
            .count();

        let (paper_id, test_id) = match destination {
            Destination::Paper { paper_id } => (Some(paper_id.clone()), None),
            Destination::Test { test_id } => (None, Some(test_id.clone())),
        };
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        let difficulty = match question.difficulty {
            Difficulty::Mixed => Difficulty::Medium,
            other => other,
        };

        Ok(Self {
            paper_id,
            test_id,
            question: question.question_text.trim().to_string(),
            options: question
                .options
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            correct_answer,
            explanation: question.explanation.as_deref().and_then(non_empty),
            difficulty: difficulty.as_str().to_string(),
            subject: non_empty(&question.subject),
            topic: non_empty(&question.topic),
            marks: if question.marks > 0 {
                question.marks
            } else {
                DEFAULT_MARKS
            },
        })
    }
}

/// 内容仓库
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// 目标剩余的空位数
    async fn check_capacity(&self, destination: &Destination) -> Result<usize, RepositoryError>;

    /// 写入题目，返回写入的数量
    async fn commit(
        &self,
        destination: &Destination,
        records: &[QuestionRecord],
    ) -> Result<usize, RepositoryError>;
}

/// 未配置仓库时的占位实现
pub struct UnconfiguredRepository;

#[async_trait]
impl ContentRepository for UnconfiguredRepository {
    async fn check_capacity(&self, _destination: &Destination) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unconfigured)
    }

    async fn commit(
        &self,
        _destination: &Destination,
        _records: &[QuestionRecord],
    ) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unconfigured)
    }
}

#[derive(Debug, Deserialize)]
struct PaperRow {
    total_questions: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TestRow {
    numquestions: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: serde_json::Value,
}

/// PostgREST 风格的仓库
///
/// - 容量 = 目标的题目总数 - 已有题目数
/// - 写入：一次批量 POST 到 `questions`
pub struct RestContentRepository {
    http: HttpExecutor,
    base_url: String,
    api_key: String,
}

impl RestContentRepository {
    pub fn new(http: HttpExecutor, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// 配置了地址和密钥时才返回实现
    pub fn from_config(config: &Config, http: HttpExecutor) -> Option<Self> {
        let url = config.repository_url.as_deref()?;
        let key = config.repository_api_key.as_deref()?;
        Some(Self::new(http, url, key))
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("apikey", self.api_key.clone()),
            ("Authorization", format!("Bearer {}", self.api_key)),
        ]
    }

    fn table_url(&self, table: &str, query: &str) -> String {
        format!("{}/rest/v1/{}?{}", self.base_url, table, query)
    }

    async fn total_slots(&self, destination: &Destination) -> Result<usize, RepositoryError> {
        let cancel = CancellationToken::new();
        let total = match destination {
            Destination::Paper { paper_id } => {
                let rows: Vec<PaperRow> = self
                    .http
                    .get_json(
                        &self.table_url("papers", &format!("id=eq.{}&select=total_questions", paper_id)),
                        &self.headers(),
                        &cancel,
                    )
                    .await?;
                rows.first()
                    .ok_or_else(|| RepositoryError::NotFound(destination.to_string()))?
                    .total_questions
            }
            Destination::Test { test_id } => {
                let rows: Vec<TestRow> = self
                    .http
                    .get_json(
                        &self.table_url("tests", &format!("id=eq.{}&select=numquestions", test_id)),
                        &self.headers(),
                        &cancel,
                    )
                    .await?;
                rows.first()
                    .ok_or_else(|| RepositoryError::NotFound(destination.to_string()))?
                    .numquestions
            }
        };
        let total = total
            .ok_or_else(|| RepositoryError::BadResponse(format!("{} 没有设置题目总数", destination)))?;
        Ok(usize::try_from(total).unwrap_or(0))
    }

    async fn existing_count(&self, destination: &Destination) -> Result<usize, RepositoryError> {
        let filter = match destination {
            Destination::Paper { paper_id } => format!("paper_id=eq.{}&select=id", paper_id),
            Destination::Test { test_id } => format!("test_id=eq.{}&select=id", test_id),
        };
        let rows: Vec<IdRow> = self
            .http
            .get_json(
                &self.table_url("questions", &filter),
                &self.headers(),
                &CancellationToken::new(),
            )
            .await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl ContentRepository for RestContentRepository {
    async fn check_capacity(&self, destination: &Destination) -> Result<usize, RepositoryError> {
        let total = self.total_slots(destination).await?;
        let existing = self.existing_count(destination).await?;
        let remaining = total.saturating_sub(existing);
        debug!(
            "[仓库] {} 容量 {}，已有 {}，剩余 {}",
            destination, total, existing, remaining
        );
        Ok(remaining)
    }

    async fn commit(
        &self,
        destination: &Destination,
        records: &[QuestionRecord],
    ) -> Result<usize, RepositoryError> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut headers = self.headers();
        headers.push(("Prefer", "return=representation".to_string()));

        let created: Vec<IdRow> = self
            .http
            .post_json(
                &self.table_url("questions", "select=id"),
                &headers,
                records,
                &CancellationToken::new(),
            )
            .await?;
        info!("[仓库] ✓ 已写入 {} 道题到 {}", created.len(), destination);
        Ok(created.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> GeneratedQuestion {
        GeneratedQuestion {
            id: "q-1".to_string(),
            question_text: "  What is 2 + 2? ".to_string(),
            options: vec![" ".into(), "3".into(), "4".into()],
            correct_option_index: 2,
            explanation: Some("  ".to_string()),
            subject: "Math".to_string(),
            topic: String::new(),
            difficulty: Difficulty::Hard,
            marks: 2,
        }
    }

    #[test]
    fn test_record_for_paper() {
        let destination = Destination::Paper {
            paper_id: "p-1".to_string(),
        };
        let record = QuestionRecord::from_question(&question(), &destination).unwrap();
        assert_eq!(record.paper_id.as_deref(), Some("p-1"));
        assert_eq!(record.test_id, None);
        assert_eq!(record.question, "What is 2 + 2?");
        assert_eq!(record.options, vec!["3", "4"]);
        assert_eq!(record.options[record.correct_answer], "4");
        assert_eq!(record.explanation, None);
        assert_eq!(record.subject.as_deref(), Some("Math"));
        assert_eq!(record.topic, None);
        assert_eq!(record.difficulty, "Hard");
        assert_eq!(record.marks, 2);
    }

    #[test]
    fn test_record_for_test_serializes_row_shape() {
        let destination = Destination::Test {
            test_id: "t-9".to_string(),
        };
        let record = QuestionRecord::from_question(&question(), &destination).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["test_id"], "t-9");
        assert!(value["paper_id"].is_null());
        assert_eq!(value["correct_answer"], 1);
    }

    #[test]
    fn test_record_answer_shifts_past_blank_options() {
        let destination = Destination::Paper {
            paper_id: "p-1".to_string(),
        };
        let mut q = question();
        q.options = vec!["A".into(), "".into(), "B".into(), " ".into(), "C".into()];
        q.correct_option_index = 4;
        let record = QuestionRecord::from_question(&q, &destination).unwrap();
        assert_eq!(record.options, vec!["A", "B", "C"]);
        assert_eq!(record.correct_answer, 2);
    }

    #[test]
    fn test_record_rejects_blank_or_missing_answer() {
        let destination = Destination::Paper {
            paper_id: "p-1".to_string(),
        };
        let mut q = question();
        q.correct_option_index = 0;
        assert!(matches!(
            QuestionRecord::from_question(&q, &destination),
            Err(SessionError::InvalidQuestion { ref id, .. }) if id == "q-1"
        ));

        q.correct_option_index = 3;
        assert!(matches!(
            QuestionRecord::from_question(&q, &destination),
            Err(SessionError::InvalidQuestion { .. })
        ));
    }

    #[test]
    fn test_table_url() {
        let repo = RestContentRepository::new(
            HttpExecutor::new(std::time::Duration::from_secs(5)).unwrap(),
            "https://db.example.co/",
            "anon",
        );
        assert_eq!(
            repo.table_url("questions", "select=id"),
            "https://db.example.co/rest/v1/questions?select=id"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_repository() {
        let destination = Destination::Paper {
            paper_id: "p".to_string(),
        };
        assert!(matches!(
            UnconfiguredRepository.check_capacity(&destination).await,
            Err(RepositoryError::Unconfigured)
        ));
    }
}
