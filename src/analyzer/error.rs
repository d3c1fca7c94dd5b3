use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 运行级错误分类
///
/// 阶段内部的瞬时故障（单次超时、单条坏记录）在阶段内消化；
/// 耗尽局部重试预算的故障升级到编排器，编排器以终态+错误描述收尾，
/// 永远不会把未处理的错误抛出自身边界。
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RunError {
    /// 无法从问题中推断出分析类型，致命且不重试
    #[error("intent classification failed: {0}")]
    Classification(String),

    /// 外部检索在退避重试一次后仍然失败
    #[error("retrieval failed after retry: {0}")]
    Retrieval(String),

    /// 外部补全服务耗尽有界重试后仍然失败
    #[error("extraction service failed after retries: {0}")]
    ExtractionService(String),

    /// 软失败：步数预算耗尽，已有的部分结果被保留用于诊断
    #[error("step budget of {0} exhausted before analysis completed")]
    StepBudgetExceeded(u32),

    /// 外部取消信号中止了运行
    #[error("run cancelled")]
    Cancelled,
}
