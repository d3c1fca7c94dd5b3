//! 运行状态 - 工作流的唯一事实来源
//!
//! 状态快照按"取出-替换"更新：每个阶段消费旧快照、返回新快照，
//! 两个阶段永远不会并发修改同一份状态。进入终态后状态不再变化。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::analyzer::error::RunError;
use crate::types::{AnalysisRequest, AnalysisResult, ChartSpec, ExtractedRecord, SearchHit};

/// 运行状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    NeedsMoreData,
    Complete,
    Failed,
}

/// 一次分析运行的完整状态快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    /// 意图分类失败时为None，此时error携带失败原因
    pub request: Option<AnalysisRequest>,
    pub step_count: u32,
    pub raw_documents: Vec<SearchHit>,
    /// 按实体名索引，保证遍历顺序确定
    pub extracted_records: BTreeMap<String, ExtractedRecord>,
    pub analysis_result: Option<AnalysisResult>,
    pub chart_spec: Option<ChartSpec>,
    pub status: RunStatus,
    pub error: Option<RunError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    fn empty() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            request: None,
            step_count: 0,
            raw_documents: Vec::new(),
            extracted_records: BTreeMap::new(),
            analysis_result: None,
            chart_spec: None,
            status: RunStatus::Running,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn new(request: AnalysisRequest) -> Self {
        Self {
            request: Some(request),
            ..Self::empty()
        }
    }

    /// 请求确立之前就终止的运行（分类失败或被取消），没有请求可记录
    pub fn failed_without_request(error: RunError) -> Self {
        Self::empty().failed(error)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Complete | RunStatus::Failed)
    }

    /// 进入下一个检索-提取周期
    pub fn begin_step(mut self) -> Self {
        debug_assert!(!self.is_terminal());
        self.step_count += 1;
        self.status = RunStatus::Running;
        self
    }

    /// 合并新检索到的文档，按内容指纹去重
    pub fn with_documents(mut self, hits: Vec<SearchHit>) -> Self {
        debug_assert!(!self.is_terminal());
        let mut seen: HashSet<String> = self
            .raw_documents
            .iter()
            .map(|doc| doc.fingerprint())
            .collect();
        for hit in hits {
            if seen.insert(hit.fingerprint()) {
                self.raw_documents.push(hit);
            }
        }
        self
    }

    /// 整体替换提取结果。提取阶段对当前全部文档重新提取，
    /// 追加合并会让同一实体的旧值残留，所以这里不做增量。
    pub fn with_records(mut self, records: BTreeMap<String, ExtractedRecord>) -> Self {
        debug_assert!(!self.is_terminal());
        self.extracted_records = records;
        self
    }

    pub fn needs_more_data(mut self) -> Self {
        debug_assert!(!self.is_terminal());
        self.status = RunStatus::NeedsMoreData;
        self
    }

    pub fn completed(mut self, analysis: AnalysisResult, chart: Option<ChartSpec>) -> Self {
        debug_assert!(!self.is_terminal());
        self.analysis_result = Some(analysis);
        self.chart_spec = chart;
        self.status = RunStatus::Complete;
        self.finished_at = Some(Utc::now());
        self
    }

    /// 进入失败终态。已累积的文档与记录保留在快照中用于诊断。
    pub fn failed(mut self, error: RunError) -> Self {
        debug_assert!(!self.is_terminal());
        self.status = RunStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
        self
    }

    /// 全部记录的平均置信度，空集合视为0.0
    pub fn mean_confidence(&self) -> f64 {
        if self.extracted_records.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .extracted_records
            .values()
            .map(|record| record.confidence)
            .sum();
        total / self.extracted_records.len() as f64
    }
}
