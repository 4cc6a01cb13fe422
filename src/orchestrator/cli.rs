//! 命令行定义（只有类型，没有行为）

use clap::{Parser, Subcommand, ValueEnum};

/// AI 出题：从文本、PDF 或视频生成选择题，审核后导入题库
#[derive(Debug, Parser)]
#[command(name = "question_forge", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 不读写会话快照（只在本次运行内有效）
    #[arg(long, global = true)]
    pub no_persist: bool,

    /// 付费转录和恢复会话不再询问，直接确认
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// 输出调试日志
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// 生成题目
    Generate {
        /// 来源类型
        #[arg(value_enum)]
        kind: SourceArg,
        /// 文本内容（或文本文件路径）、PDF 路径、视频链接
        input: String,
        /// 题目数量
        #[arg(long, default_value_t = 10)]
        count: u32,
        /// 期望的输出格式
        #[arg(long, value_enum, default_value_t = FormatArg::Json)]
        format: FormatArg,
        /// 难度：easy / medium / hard / mixed
        #[arg(long, default_value = "mixed")]
        difficulty: String,
        /// 生成动作
        #[arg(long, value_enum, default_value_t = ActionArg::New)]
        action: ActionArg,
        /// 附加指令
        #[arg(long)]
        instruction: Option<String>,
        /// 文本来源的名称
        #[arg(long, default_value = "custom_text")]
        label: String,
    },
    /// 用当前的来源和配置重新生成
    Retry,
    /// 显示当前会话
    Show,
    /// 标记题目为通过
    Approve {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// 全部通过
    ApproveAll,
    /// 删除一道题
    Remove { id: String },
    /// 导入题库
    Commit {
        #[arg(value_enum)]
        target: TargetArg,
        /// 试卷或测试的 id
        id: String,
    },
    /// 放弃当前会话
    Dismiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Text,
    Pdf,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    New,
    Variants,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
    Paper,
    Test,
}
