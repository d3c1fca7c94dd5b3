//! 分析流水线 - 意图分类、检索、提取、分析、可视化的编排入口

pub mod agents;
pub mod context;
pub mod error;
pub mod outlet;
pub mod ports;
pub mod state;
pub mod workflow;

use anyhow::Result;
use std::sync::Arc;

pub use context::AnalyzerContext;
pub use error::RunError;
pub use outlet::AnalysisReport;
pub use state::{RunState, RunStatus};

use crate::config::Config;
use crate::llm::client::LLMClient;
use crate::search::TavilyProvider;
use outlet::{DiskOutlet, Outlet};
use ports::RigCompletionPort;
use workflow::Orchestrator;

/// 运行一次完整分析并持久化结果
///
/// Ctrl-C会触发取消信号，运行以取消终态收尾并照常落盘。
pub async fn launch(config: Config, question: &str) -> Result<AnalysisReport> {
    let llm = LLMClient::new(config.clone())?;
    llm.check_connection().await?;

    let search = Arc::new(TavilyProvider::new(config.search.clone())?);
    let completion = Arc::new(RigCompletionPort::new(llm));
    let context = AnalyzerContext::new(config.clone());

    let (cancel_tx, cancel_rx) = workflow::cancel_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("⚠️ 收到中断信号，正在终止运行...");
            let _ = cancel_tx.send(true);
        }
    });

    let orchestrator =
        Orchestrator::new(context, search, completion).with_cancellation(cancel_rx);
    let state = orchestrator.run(question).await;

    let report = AnalysisReport::from(&state);
    DiskOutlet::new(&config).save(&report).await?;
    Ok(report)
}

/// 读取最近一次保存的结果；没有历史结果时返回占位报告
pub fn load_last(config: &Config) -> Result<AnalysisReport> {
    DiskOutlet::new(config).load_last()
}
