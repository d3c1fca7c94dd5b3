//! 结果出口 - 运行结果的持久化与回读
//!
//! 每次运行覆盖写入同一个`last_result.json`，保留的永远是最近一次。
//! 失败的运行同样落盘，错误描述与部分结果一起保存。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::analyzer::error::RunError;
use crate::analyzer::state::{RunState, RunStatus};
use crate::config::Config;
use crate::types::{AnalysisRequest, ChartSpec, Row};

/// 落盘的分析报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub request: Option<AnalysisRequest>,
    pub status: RunStatus,
    pub table: Vec<Row>,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub chart_spec: Option<ChartSpec>,
    pub error: Option<RunError>,
    pub generated_at: DateTime<Utc>,
    pub version: String,
}

impl From<&RunState> for AnalysisReport {
    fn from(state: &RunState) -> Self {
        let (table, summary, recommendations) = match &state.analysis_result {
            Some(result) => (
                result.table.clone(),
                result.summary.clone(),
                result.recommendations.clone(),
            ),
            None => (
                Vec::new(),
                state
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
                Vec::new(),
            ),
        };

        Self {
            request: state.request.clone(),
            status: state.status,
            table,
            summary,
            recommendations,
            chart_spec: state.chart_spec.clone(),
            error: state.error.clone(),
            generated_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl AnalysisReport {
    /// 没有历史结果时的占位报告
    fn placeholder() -> Self {
        Self {
            request: None,
            status: RunStatus::Complete,
            table: Vec::new(),
            summary: "There are no saved results yet. Run an analysis first.".to_string(),
            recommendations: Vec::new(),
            chart_spec: None,
            error: None,
            generated_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// 报告出口接口
pub trait Outlet {
    async fn save(&self, report: &AnalysisReport) -> Result<()>;
}

/// 磁盘出口 - 覆盖写入固定路径
pub struct DiskOutlet {
    results_file: PathBuf,
}

impl DiskOutlet {
    pub fn new(config: &Config) -> Self {
        Self {
            results_file: config.results_file(),
        }
    }

    pub fn load_last(&self) -> Result<AnalysisReport> {
        if !self.results_file.exists() {
            return Ok(AnalysisReport::placeholder());
        }
        let raw = std::fs::read_to_string(&self.results_file)
            .with_context(|| format!("读取结果文件失败: {}", self.results_file.display()))?;
        let report = serde_json::from_str(&raw)
            .with_context(|| format!("解析结果文件失败: {}", self.results_file.display()))?;
        Ok(report)
    }
}

impl Outlet for DiskOutlet {
    async fn save(&self, report: &AnalysisReport) -> Result<()> {
        if let Some(parent) = self.results_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("创建结果目录失败: {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(report)?;
        std::fs::write(&self.results_file, serialized)
            .with_context(|| format!("写入结果文件失败: {}", self.results_file.display()))?;
        println!("💾 结果已保存到 {}", self.results_file.display());
        Ok(())
    }
}
