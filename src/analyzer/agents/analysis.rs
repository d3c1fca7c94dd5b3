//! 分析Agent - 确定性聚合 + 叙事生成
//!
//! 表格完全由纯函数聚合得到：同一批记录无论运行多少次，
//! 行序与取值都一致。LLM只负责摘要与建议，叙事生成失败时
//! 用模板兜底，不会让整个运行失败。空记录集产出空结果而非错误。

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::analyzer::ports::{CompletionPort, Narrative};
use crate::types::{AnalysisRequest, AnalysisResult, AnalysisType, ExtractedRecord, Row, Scalar};

/// 每种分析类型的主排序指标，也是图表取值的列
pub fn primary_metric(analysis_type: AnalysisType) -> &'static str {
    match analysis_type {
        AnalysisType::Gap => "demand_score",
        AnalysisType::Trending => "velocity",
        AnalysisType::TopSelling => "sales_proxy",
        AnalysisType::Competitor => "market_share",
    }
}

pub async fn analyze(
    port: &dyn CompletionPort,
    request: &AnalysisRequest,
    records: &BTreeMap<String, ExtractedRecord>,
) -> AnalysisResult {
    println!("📊 正在聚合 {} 条记录...", records.len());

    if records.is_empty() {
        return AnalysisResult::empty(format!(
            "No market data was found for '{}' on {} in {} within {}.",
            request.product, request.platform, request.region, request.time_window
        ));
    }

    let table = aggregate(request.analysis_type, records);
    if table.is_empty() {
        // 比如空缺分析里所有候选都已在目标平台铺货
        return AnalysisResult::empty(format!(
            "No {} findings stood out for '{}' on {} in {}.",
            request.analysis_type, request.product, request.platform, request.region
        ));
    }

    let narrative = match port.narrate(request, &table).await {
        Ok(narrative) => narrative,
        Err(e) => {
            eprintln!("⚠️ 叙事生成失败，使用模板摘要: {}", e);
            fallback_narrative(request, &table)
        }
    };

    AnalysisResult {
        table,
        summary: narrative.summary,
        recommendations: narrative.recommendations,
    }
}

/// 按分析类型聚合出有序表格
pub fn aggregate(
    analysis_type: AnalysisType,
    records: &BTreeMap<String, ExtractedRecord>,
) -> Vec<Row> {
    let mut rows = match analysis_type {
        AnalysisType::Gap => gap_rows(records),
        AnalysisType::Trending => ranked_rows(
            records,
            &["velocity", "trend_score"],
            "velocity",
            &["growth", "interest_level"],
        ),
        AnalysisType::TopSelling => ranked_rows(
            records,
            &["sales_proxy", "revenue"],
            "sales_proxy",
            &["revenue", "rating", "reviews"],
        ),
        AnalysisType::Competitor => competitor_rows(records),
    };
    sort_rows(&mut rows, primary_metric(analysis_type));
    rows
}

/// 市场空缺：剔除已在目标平台铺货的实体，按需求分排名
fn gap_rows(records: &BTreeMap<String, ExtractedRecord>) -> Vec<Row> {
    records
        .values()
        .filter(|record| {
            !record
                .attributes
                .get("available_elsewhere")
                .and_then(Scalar::as_bool)
                .unwrap_or(false)
        })
        .map(|record| {
            let mut row = base_row(record);
            row.insert(
                "demand_score".to_string(),
                Scalar::Number(record.numeric_attr(&["demand_score", "demand"]).unwrap_or(0.0)),
            );
            copy_attrs(&mut row, record, &["competition", "opportunity", "market_size"]);
            row
        })
        .collect()
}

/// 通用排名表：主指标来自备选键，缺失按0.0处理
fn ranked_rows(
    records: &BTreeMap<String, ExtractedRecord>,
    metric_keys: &[&str],
    metric_column: &str,
    extra_columns: &[&str],
) -> Vec<Row> {
    records
        .values()
        .map(|record| {
            let mut row = base_row(record);
            row.insert(
                metric_column.to_string(),
                Scalar::Number(record.numeric_attr(metric_keys).unwrap_or(0.0)),
            );
            copy_attrs(&mut row, record, extra_columns);
            row
        })
        .collect()
}

/// 竞争对手：按品牌/卖家分组，份额与评分取组内均值
fn competitor_rows(records: &BTreeMap<String, ExtractedRecord>) -> Vec<Row> {
    let mut groups: BTreeMap<String, Vec<&ExtractedRecord>> = BTreeMap::new();
    for record in records.values() {
        let brand = record
            .attributes
            .get("brand")
            .and_then(Scalar::as_text)
            .unwrap_or(&record.entity_name)
            .to_string();
        groups.entry(brand).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(brand, members)| {
            let mut row = Row::new();
            row.insert("entity_name".to_string(), Scalar::Text(brand));
            row.insert(
                "market_share".to_string(),
                Scalar::Number(mean_attr(&members, &["market_share", "share"]).unwrap_or(0.0)),
            );
            if let Some(rating) = mean_attr(&members, &["rating"]) {
                row.insert("rating".to_string(), Scalar::Number(rating));
            }
            row.insert(
                "records".to_string(),
                Scalar::Number(members.len() as f64),
            );
            // 组内代表取置信度最高者；members按实体名有序，平局时结果稳定
            if let Some(best) = members.iter().max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(Ordering::Equal)
            }) {
                copy_attrs(&mut row, best, &["strength", "weakness"]);
            }
            row
        })
        .collect()
}

fn base_row(record: &ExtractedRecord) -> Row {
    let mut row = Row::new();
    row.insert(
        "entity_name".to_string(),
        Scalar::Text(record.entity_name.clone()),
    );
    row
}

fn copy_attrs(row: &mut Row, record: &ExtractedRecord, keys: &[&str]) {
    for key in keys {
        if let Some(value) = record.attributes.get(*key) {
            row.entry((*key).to_string()).or_insert_with(|| value.clone());
        }
    }
}

fn mean_attr(members: &[&ExtractedRecord], keys: &[&str]) -> Option<f64> {
    let values: Vec<f64> = members
        .iter()
        .filter_map(|record| record.numeric_attr(keys))
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// 主指标降序，平局按实体名字典序升序，排序结果与输入顺序无关
fn sort_rows(rows: &mut [Row], metric: &str) {
    rows.sort_by(|a, b| {
        let metric_a = a.get(metric).and_then(Scalar::as_number).unwrap_or(0.0);
        let metric_b = b.get(metric).and_then(Scalar::as_number).unwrap_or(0.0);
        metric_b
            .partial_cmp(&metric_a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                let name_a = a.get("entity_name").and_then(Scalar::as_text).unwrap_or("");
                let name_b = b.get("entity_name").and_then(Scalar::as_text).unwrap_or("");
                name_a.cmp(name_b)
            })
    });
}

/// 叙事服务不可用时的确定性兜底
fn fallback_narrative(request: &AnalysisRequest, table: &[Row]) -> Narrative {
    let leader = table
        .first()
        .and_then(|row| row.get("entity_name"))
        .and_then(Scalar::as_text)
        .unwrap_or("the top entry")
        .to_string();

    Narrative {
        summary: format!(
            "The {} analysis of '{}' on {} in {} ranked {} entries; {} leads the table.",
            request.analysis_type,
            request.product,
            request.platform,
            request.region,
            table.len(),
            leader
        ),
        recommendations: vec![
            format!("Review {} in detail before committing inventory.", leader),
            "Re-run the analysis with a narrower product scope for deeper signals.".to_string(),
        ],
    }
}
