//! 提取Agent - 把原始检索材料转成结构化记录
//!
//! 文档按批次切分后有界并发提取。单条非法记录丢弃并计数，
//! 不中断所在批次；补全服务耗尽重试后仍失败则整个阶段升级报错。

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::analyzer::context::AnalyzerContext;
use crate::analyzer::error::RunError;
use crate::analyzer::ports::CompletionPort;
use crate::types::{AnalysisRequest, ExtractedRecord, SearchHit};
use crate::utils::threads::do_parallel_with_limit;

pub async fn extract(
    context: &AnalyzerContext,
    port: &dyn CompletionPort,
    request: &AnalysisRequest,
    documents: &[SearchHit],
) -> Result<BTreeMap<String, ExtractedRecord>, RunError> {
    if documents.is_empty() {
        return Ok(BTreeMap::new());
    }
    println!("🔬 正在从 {} 份材料中提取结构化记录...", documents.len());

    let batch_size = context.config.workflow.batch_size.max(1);
    let limit = context.config.llm.max_parallels.max(1);

    let tasks: Vec<_> = documents
        .chunks(batch_size)
        .map(|chunk| port.extract_records(request, chunk))
        .collect();
    let outcomes = do_parallel_with_limit(tasks, limit).await;

    let mut merged: BTreeMap<String, ExtractedRecord> = BTreeMap::new();
    let mut dropped = 0usize;
    for outcome in outcomes {
        let batch = outcome.map_err(|e| RunError::ExtractionService(e.to_string()))?;
        for record in batch.records {
            if !record.is_valid() {
                dropped += 1;
                continue;
            }
            // 同一实体出现在多个批次时保留置信度更高的版本；
            // 结果按输入顺序归并，平局时先到者胜，结果可复现
            match merged.entry(record.entity_name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(mut slot) => {
                    if record.confidence > slot.get().confidence {
                        slot.insert(record);
                    }
                }
            }
        }
    }

    if dropped > 0 {
        eprintln!("⚠️ 丢弃了 {} 条不满足约束的记录", dropped);
    }
    println!("✅ 提取完成，共 {} 个实体", merged.len());
    Ok(merged)
}
