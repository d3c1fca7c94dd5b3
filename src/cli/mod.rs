//! 命令行接口

use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// 面向电商卖家的市场调研分析工具
#[derive(Parser, Debug)]
#[command(name = "marketscope-rs", version, about)]
pub struct Args {
    /// 要分析的市场问题，如 "Find a market gap for 'earbuds' on 'Amazon' in 'US'"
    #[arg(value_name = "QUESTION")]
    pub question: Option<String>,

    /// 配置文件路径（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 读取最近一次保存的结果，不发起新分析
    #[arg(long, default_value_t = false)]
    pub load_last: bool,

    /// 结果输出目录
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 步数预算：检索-提取循环的最大轮数
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// LLM provider（openai/deepseek/anthropic/gemini/ollama）
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// LLM API KEY（优先于环境变量）
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// 检索API KEY（优先于环境变量）
    #[arg(long)]
    pub search_api_key: Option<String>,

    /// 启用详细日志
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// 命令行参数覆盖配置文件，配置文件覆盖默认值
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(output) = self.output {
            config.results_dir = output;
        }
        if let Some(max_steps) = self.max_steps {
            config.workflow.max_steps = max_steps;
        }
        if let Some(provider) = self.llm_provider {
            config.llm.provider = provider.parse().map_err(|e: String| anyhow!(e))?;
        }
        if let Some(api_key) = self.llm_api_key {
            config.llm.api_key = api_key;
        }
        if let Some(base_url) = self.llm_api_base_url {
            config.llm.api_base_url = base_url;
        }
        if let Some(api_key) = self.search_api_key {
            config.search.api_key = api_key;
        }
        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}
