use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use question_forge::orchestrator::{App, Cli, ResumePrompt, TerminalPrompts};
use question_forge::services::{CostConfirmation, FixedConfirmation};
use question_forge::utils::logging;
use question_forge::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging);

    let (confirmation, resume): (Arc<dyn CostConfirmation>, Box<dyn ResumePrompt>) = if cli.yes {
        (Arc::new(FixedConfirmation(true)), Box::new(FixedConfirmation(true)))
    } else {
        (Arc::new(TerminalPrompts::new()), Box::new(TerminalPrompts::new()))
    };

    // 初始化应用
    let mut app = App::initialize(config, !cli.no_persist, confirmation).await?;

    // Ctrl-C 取消正在进行的生成
    let cancel = app.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到 Ctrl-C，正在取消...");
            cancel.shutdown();
        }
    });

    app.run(cli.command, resume.as_ref()).await?;

    Ok(())
}
