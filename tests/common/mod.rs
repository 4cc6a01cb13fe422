#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use question_forge::error::{AcquisitionError, GatewayError, RepositoryError};
use question_forge::models::credentials::{ProviderCredentialSet, ProviderId};
use question_forge::services::{
    AcquisitionTarget, ContentRepository, Destination, FixedConfirmation, GenerationProvider,
    MemorySessionStore, PromptBuilder, ProviderGateway, QuestionRecord, SessionStore,
    StructuredResponseExtractor, TranscriptAcquisitionChain, TranscriptSource,
};
use question_forge::workflow::{FlowDeps, GenerationFlow};

pub const TWO_QUESTIONS: &str = r#"Sure! Here are the questions:
```json
[
  {"question": "What is 2 + 2?", "options": ["3", "4", "5", "6"], "correctAnswer": 1,
   "explanation": "Basic addition", "subject": "Math", "topic": "Arithmetic", "difficulty": "Easy", "marks": 2},
  {"question": "Which planet is known as the red planet?", "options": ["Venus", "Mars", "Jupiter", "Saturn"],
   "correctAnswer": "1", "subject": "Science", "topic": "Astronomy", "difficulty": "medium"}
]
```
Let me know if you need more."#;

/// 模拟提供方的一次行为
#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Fail,
    Hang,
}

/// 按脚本依次回复的提供方；脚本用完后一直失败
pub struct ScriptedProvider {
    id: ProviderId,
    script: Mutex<VecDeque<Script>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new(id: ProviderId, script: Vec<Script>) -> Self {
        Self {
            id,
            script: Mutex::new(script.into()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn complete(
        &self,
        _secret: &str,
        prompt: &str,
        _cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Script::Fail);
        match next {
            Script::Reply(text) => Ok(text),
            Script::Fail => Err(GatewayError::request_failed(self.id.as_str(), "HTTP 500")),
            Script::Hang => std::future::pending().await,
        }
    }
}

/// 模拟文本来源
pub struct FakeSource {
    pub name: &'static str,
    pub paid: bool,
    pub text: Option<String>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn returning(name: &'static str, text: &str) -> Self {
        Self {
            name,
            paid: false,
            text: Some(text.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            paid: false,
            text: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn paid(mut self) -> Self {
        self.paid = true;
        self
    }
}

#[async_trait]
impl TranscriptSource for FakeSource {
    fn name(&self) -> &str {
        self.name
    }

    fn accepts(&self, _target: &AcquisitionTarget) -> bool {
        true
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn is_paid(&self) -> bool {
        self.paid
    }

    async fn fetch(
        &self,
        _target: &AcquisitionTarget,
        _cancel: &CancellationToken,
    ) -> Result<String, AcquisitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| AcquisitionError::unavailable(self.name, "HTTP 503"))
    }
}

/// 模拟题库
pub struct FakeRepository {
    pub remaining: usize,
    pub fail_commit: bool,
    pub committed: Mutex<Vec<(Destination, Vec<QuestionRecord>)>>,
}

impl FakeRepository {
    pub fn with_capacity(remaining: usize) -> Self {
        Self {
            remaining,
            fail_commit: false,
            committed: Mutex::new(Vec::new()),
        }
    }

    pub fn commit_calls(&self) -> usize {
        self.committed.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentRepository for FakeRepository {
    async fn check_capacity(&self, _destination: &Destination) -> Result<usize, RepositoryError> {
        Ok(self.remaining)
    }

    async fn commit(
        &self,
        destination: &Destination,
        records: &[QuestionRecord],
    ) -> Result<usize, RepositoryError> {
        if self.fail_commit {
            return Err(RepositoryError::BadResponse("HTTP 409".to_string()));
        }
        self.committed
            .lock()
            .unwrap()
            .push((destination.clone(), records.to_vec()));
        Ok(records.len())
    }
}

/// 测试用的流程装配
pub struct Harness {
    pub store: Arc<MemorySessionStore>,
    pub repository: Arc<FakeRepository>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

pub struct HarnessBuilder {
    script: Vec<Script>,
    sources: Vec<Box<dyn TranscriptSource>>,
    confirm_paid: bool,
    repository: FakeRepository,
    store: Arc<MemorySessionStore>,
    attempt_timeout: Duration,
}

impl HarnessBuilder {
    pub fn new(script: Vec<Script>) -> Self {
        Self {
            script,
            sources: Vec::new(),
            confirm_paid: false,
            repository: FakeRepository::with_capacity(50),
            store: Arc::new(MemorySessionStore::new()),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    pub fn source(mut self, source: FakeSource) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn confirm_paid(mut self, confirm: bool) -> Self {
        self.confirm_paid = confirm;
        self
    }

    pub fn repository(mut self, repository: FakeRepository) -> Self {
        self.repository = repository;
        self
    }

    pub fn store(mut self, store: Arc<MemorySessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn build(self) -> (GenerationFlow, Harness) {
        let (deps, harness) = self.build_deps();
        (GenerationFlow::new(deps), harness)
    }

    pub fn build_deps(self) -> (FlowDeps, Harness) {
        let provider = ScriptedProvider::new(ProviderId::Gemini, self.script);
        let prompts = provider.prompts.clone();
        let credentials = ProviderCredentialSet::new().with(ProviderId::Gemini, Some("test-key".to_string()));
        let repository = Arc::new(self.repository);

        let deps = FlowDeps {
            chain: TranscriptAcquisitionChain::new(
                self.sources,
                Arc::new(FixedConfirmation(self.confirm_paid)),
                self.attempt_timeout,
            ),
            gateway: ProviderGateway::new(vec![Box::new(provider)], credentials, self.attempt_timeout),
            extractor: StructuredResponseExtractor::new(),
            prompt: PromptBuilder::new(10_000),
            store: self.store.clone() as Arc<dyn SessionStore>,
            repository: repository.clone(),
        };
        (
            deps,
            Harness {
                store: self.store,
                repository,
                prompts,
            },
        )
    }
}
