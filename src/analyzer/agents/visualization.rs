//! 可视化Agent - 从分析表格派生声明式图表规格
//!
//! 图表类型由分析类型固定映射，不做自由选择；
//! 每行产出一条系列，标签为实体名，取值为该类型的主指标。

use anyhow::{Result, anyhow};

use crate::analyzer::agents::analysis::primary_metric;
use crate::types::{AnalysisResult, AnalysisType, ChartSpec, ChartType, Scalar, Series};

pub fn chart_type_for(analysis_type: AnalysisType) -> ChartType {
    match analysis_type {
        AnalysisType::Gap => ChartType::Bar,
        AnalysisType::Trending => ChartType::Line,
        AnalysisType::TopSelling => ChartType::Bar,
        AnalysisType::Competitor => ChartType::Pie,
    }
}

pub fn build_chart(analysis_type: AnalysisType, result: &AnalysisResult) -> Result<ChartSpec> {
    let metric = primary_metric(analysis_type);
    let mut series = Vec::with_capacity(result.table.len());

    for row in &result.table {
        let label = row
            .get("entity_name")
            .and_then(Scalar::as_text)
            .ok_or_else(|| anyhow!("analysis row is missing entity_name"))?
            .to_string();
        let value = row
            .get(metric)
            .and_then(Scalar::as_number)
            .ok_or_else(|| anyhow!("analysis row is missing numeric column {}", metric))?;
        series.push(Series {
            label,
            values: vec![value],
        });
    }

    Ok(ChartSpec {
        chart_type: chart_type_for(analysis_type),
        series,
    })
}
