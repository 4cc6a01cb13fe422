//! 应用生命周期 - 编排层
//!
//! ## 职责
//!
//! 1. **初始化**：合并密钥、创建 HTTP 执行器、选择快照存储和题库
//! 2. **恢复**：启动时读取一次快照，需要时询问用户恢复还是放弃
//! 3. **分发命令**：把命令行子命令交给 `GenerationFlow`
//!
//! 本层不做业务判断，只做装配和展示。

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::StoreError;
use crate::infrastructure::HttpExecutor;
use crate::models::credentials::ProviderCredentialSet;
use crate::models::generation::{GenerationAction, GenerationConfig, OutputShape, SourceDescriptor};
use crate::models::loaders::load_credentials;
use crate::models::question::Difficulty;
use crate::models::session::{GenerationSession, Stage};
use crate::orchestrator::cli::{ActionArg, Commands, FormatArg, SourceArg, TargetArg};
use crate::orchestrator::prompts::ResumePrompt;
use crate::services::{
    ContentRepository, CostConfirmation, Destination, FileSessionStore, MemorySessionStore,
    PromptBuilder, ProviderGateway, RestContentRepository, SessionStore,
    StructuredResponseExtractor, TranscriptAcquisitionChain, UnconfiguredRepository,
};
use crate::utils::logging::{log_startup, truncate_text};
use crate::workflow::{CancelHandle, FlowDeps, GenerationFlow};

enum Snapshot {
    Missing,
    Corrupt,
    Found(GenerationSession),
}

/// 启动时读取快照的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// 没有快照
    Empty,
    /// 快照损坏，已清除
    Corrupt,
    /// 不需要询问的快照（Idle），原样装入
    Installed(Stage),
    /// 用户选择恢复；`reran` 表示是否重新运行了一次生成
    Resumed { reran: bool },
    /// 用户选择放弃
    Dismissed,
}

/// 应用主结构
pub struct App {
    config: Config,
    store: Arc<dyn SessionStore>,
    flow: GenerationFlow,
}

/// 合并密钥：密钥文件 ← 配置（已包含环境变量）
async fn resolve_credentials(config: &Config) -> Result<ProviderCredentialSet> {
    let mut credentials = match &config.credentials_file {
        Some(path) => load_credentials(path).await?,
        None => ProviderCredentialSet::new(),
    };
    credentials.overlay(&config.inline_credentials());
    Ok(credentials)
}

impl App {
    /// 初始化应用
    ///
    /// `persist` 为 false 时快照只保存在内存中。
    pub async fn initialize(
        config: Config,
        persist: bool,
        confirmation: Arc<dyn CostConfirmation>,
    ) -> Result<Self> {
        let credentials = resolve_credentials(&config).await?;
        let http = HttpExecutor::new(config.http_timeout()).context("无法创建 HTTP 客户端")?;

        let store: Arc<dyn SessionStore> = if persist {
            Arc::new(FileSessionStore::new(
                config.session_dir.clone(),
                config.session_key.clone(),
            ))
        } else {
            Arc::new(MemorySessionStore::new())
        };

        let repository: Arc<dyn ContentRepository> =
            match RestContentRepository::from_config(&config, http.clone()) {
                Some(repository) => Arc::new(repository),
                None => {
                    debug!("[仓库] 未配置题库地址，导入将不可用");
                    Arc::new(UnconfiguredRepository)
                }
            };

        log_startup(credentials.configured_count(), &store.location());

        let deps = FlowDeps {
            chain: TranscriptAcquisitionChain::from_config(&config, http.clone(), confirmation),
            gateway: ProviderGateway::from_config(&config, &http, credentials),
            extractor: StructuredResponseExtractor::new(),
            prompt: PromptBuilder::new(config.max_source_chars),
            store,
            repository,
        };
        Ok(Self::with_deps(config, deps))
    }

    /// 用现成的依赖装配（测试用）
    pub fn with_deps(config: Config, deps: FlowDeps) -> Self {
        let store = deps.store.clone();
        Self {
            config,
            store,
            flow: GenerationFlow::new(deps),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn flow(&self) -> &GenerationFlow {
        &self.flow
    }

    pub fn flow_mut(&mut self) -> &mut GenerationFlow {
        &mut self.flow
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.flow.cancel_handle()
    }

    /// 读取快照；损坏的快照会被清除
    async fn load_snapshot(&self) -> Result<Snapshot> {
        match self.store.load().await {
            Ok(Some(session)) => Ok(Snapshot::Found(session)),
            Ok(None) => Ok(Snapshot::Missing),
            Err(StoreError::Corrupt(e)) => {
                warn!("[会话] ⚠️ 快照已损坏，重新开始: {}", e);
                self.store.clear().await?;
                Ok(Snapshot::Corrupt)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 启动时恢复会话
    ///
    /// 未完成或待审核的会话不会被静默恢复，也不会被静默丢弃：
    /// 由 `prompt` 决定恢复还是放弃。
    pub async fn restore(&mut self, prompt: &dyn ResumePrompt) -> Result<RestoreOutcome> {
        let recovered = match self.load_snapshot().await? {
            Snapshot::Found(session) => session,
            Snapshot::Missing => return Ok(RestoreOutcome::Empty),
            Snapshot::Corrupt => return Ok(RestoreOutcome::Corrupt),
        };

        if !recovered.is_resumable() {
            let stage = recovered.stage;
            self.flow.install(recovered)?;
            return Ok(RestoreOutcome::Installed(stage));
        }

        if prompt.offer_resume(&recovered).await {
            let reran = self.flow.adopt_recovered(recovered).await?;
            Ok(RestoreOutcome::Resumed { reran })
        } else {
            self.flow.dismiss().await?;
            Ok(RestoreOutcome::Dismissed)
        }
    }

    /// 执行一条命令
    pub async fn run(&mut self, command: Commands, prompt: &dyn ResumePrompt) -> Result<()> {
        if let Commands::Generate {
            kind,
            input,
            count,
            format,
            difficulty,
            action,
            instruction,
            label,
        } = command
        {
            if let RestoreOutcome::Resumed { .. } = self.restore(prompt).await? {
                info!("[会话] 已恢复上次的会话；如需重新生成请先执行 dismiss");
                self.show();
                return Ok(());
            }
            let source = build_source(kind, &input, &label).await?;
            let config = build_config(count, format, &difficulty, action, instruction)?;
            self.flow.start(source, config).await?;
            self.show();
            return Ok(());
        }

        // 其余命令直接作用于已保存的会话
        if let Snapshot::Found(session) = self.load_snapshot().await? {
            self.flow.install(session)?;
        }

        match command {
            Commands::Retry => {
                self.flow.retry().await?;
                self.show();
            }
            Commands::Show => self.show(),
            Commands::Approve { ids } => {
                for id in ids {
                    let already = self
                        .flow
                        .session()
                        .is_some_and(|s| s.approved_ids.contains(&id));
                    if !already {
                        self.flow.toggle_approval(&id).await?;
                    }
                    info!("[会话] ✓ 已通过 {}", id);
                }
            }
            Commands::ApproveAll => {
                let count = self.flow.approve_all().await?;
                info!("[会话] ✓ 已全部通过 ({} 道)", count);
            }
            Commands::Remove { id } => self.flow.remove_question(&id).await?,
            Commands::Commit { target, id } => {
                let destination = match target {
                    TargetArg::Paper => Destination::Paper { paper_id: id },
                    TargetArg::Test => Destination::Test { test_id: id },
                };
                self.flow.commit(&destination).await?;
            }
            Commands::Dismiss => self.flow.dismiss().await?,
            Commands::Generate { .. } => {}
        }
        Ok(())
    }

    /// 打印当前会话
    pub fn show(&self) {
        let Some(session) = self.flow.session() else {
            println!("当前没有生成会话");
            return;
        };
        println!(
            "来源: {} | 阶段: {} | 进度: {}%",
            truncate_text(&session.source.label, 60),
            session.stage.label(),
            session.progress_percent
        );
        for question in &session.questions {
            let mark = if session.approved_ids.contains(&question.id) {
                "✓"
            } else {
                " "
            };
            println!(
                "[{}] {} ({} / {} 分) {}",
                mark,
                question.id,
                question.difficulty,
                question.marks,
                question.question_text
            );
            for (index, option) in question.options.iter().enumerate() {
                let correct = if index == question.correct_option_index {
                    "*"
                } else {
                    " "
                };
                println!("     {} {}. {}", correct, index + 1, option);
            }
        }
    }
}

async fn build_source(kind: SourceArg, input: &str, label: &str) -> Result<SourceDescriptor> {
    let source = match kind {
        SourceArg::Text => {
            let path = Path::new(input);
            let text = if path.is_file() {
                tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("无法读取文本文件: {}", path.display()))?
            } else {
                input.to_string()
            };
            SourceDescriptor::text(label, text)
        }
        SourceArg::Pdf => SourceDescriptor::document(input),
        SourceArg::Video => SourceDescriptor::video(input),
    };
    Ok(source)
}

fn build_config(
    count: u32,
    format: FormatArg,
    difficulty: &str,
    action: ActionArg,
    instruction: Option<String>,
) -> Result<GenerationConfig> {
    let Some(difficulty) = Difficulty::from_config_str(difficulty) else {
        bail!("无法识别的难度: {}", difficulty);
    };
    Ok(GenerationConfig {
        question_count: count,
        output_shape: match format {
            FormatArg::Json => OutputShape::Structured,
            FormatArg::Csv => OutputShape::Tabular,
        },
        difficulty,
        action: match action {
            ActionArg::New => GenerationAction::GenerateNew,
            ActionArg::Variants => GenerationAction::GenerateVariants,
            ActionArg::None => GenerationAction::None,
        },
        custom_instruction: instruction,
    })
}
