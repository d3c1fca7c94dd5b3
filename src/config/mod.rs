use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Gemini => write!(f, "gemini"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "gemini" => Ok(LLMProvider::Gemini),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// 结果输出目录
    pub results_dir: PathBuf,

    /// 工作流配置
    pub workflow: WorkflowConfig,

    /// 检索后端配置
    pub search: SearchConfig,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// 工作流配置
///
/// 阈值与批大小没有负载依据，按合理默认值处理，保持可调。
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkflowConfig {
    /// 步数预算：检索-提取循环的最大轮数
    pub max_steps: u32,

    /// 平均置信度阈值，达到后才进入分析阶段
    pub confidence_threshold: f64,

    /// 提取阶段每批提交给模型的文档数上限
    pub batch_size: usize,
}

/// 检索后端配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// 检索API KEY
    pub api_key: String,

    /// 检索API基地址
    pub api_base_url: String,

    /// 单次检索返回的结果数上限
    pub max_results: usize,

    /// 瞬时失败后重试前的等待时间（毫秒）
    pub retry_delay_ms: u64,

    /// 超时时间（秒），超时按服务失败处理
    pub timeout_seconds: u64,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 高能效模型，优先用于常规提取任务
    pub model_efficient: String,

    /// 高质量模型，用于复杂推理任务，以及作为efficient失效情况下的兜底
    pub model_powerful: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 首次重试间隔（毫秒），之后按指数退避递增
    pub retry_delay_ms: u64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,

    /// 提取阶段批次级的最大并发数
    pub max_parallels: usize,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 最近一次运行结果的固定落盘路径
    pub fn results_file(&self) -> PathBuf {
        self.results_dir.join("last_result.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("./results"),
            workflow: WorkflowConfig::default(),
            search: SearchConfig::default(),
            llm: LLMConfig::default(),
            verbose: false,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            confidence_threshold: 0.6,
            batch_size: 10,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("TAVILY_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.tavily.com"),
            max_results: 10,
            retry_delay_ms: 1500,
            timeout_seconds: 30,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("MARKETSCOPE_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api-inference.modelscope.cn/v1"),
            model_efficient: String::from("Qwen/Qwen3-Next-80B-A3B-Instruct"),
            model_powerful: String::from("Qwen/Qwen3-235B-A22B-Instruct-2507"),
            max_tokens: 8192,
            temperature: 0.2,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            timeout_seconds: 120,
            max_parallels: 3,
        }
    }
}
