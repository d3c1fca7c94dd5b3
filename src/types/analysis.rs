use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::record::Scalar;

/// 分析表格中的一行，键为列名
pub type Row = BTreeMap<String, Scalar>;

/// 分析结果 - 确定性聚合出的表格 + LLM生成的叙述性内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    /// 有序数据表，行序即排名
    pub table: Vec<Row>,

    /// 分析摘要
    pub summary: String,

    /// 可执行建议列表
    pub recommendations: Vec<String>,
}

impl AnalysisResult {
    /// 构造空结果，用于无数据场景（按约定不视为错误）
    pub fn empty(summary: impl Into<String>) -> Self {
        Self {
            table: Vec::new(),
            summary: summary.into(),
            recommendations: Vec::new(),
        }
    }
}
