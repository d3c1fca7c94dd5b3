//! 检索适配层 - 封装外部市场检索后端
//!
//! 后端的瞬时失败（限流、网络抖动、超时）与永久性的"无结果"空响应
//! 必须可区分：前者由工作流按退避策略重试一次，后者是合法的空数据。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SearchHit;

mod tavily;

pub use tavily::TavilyProvider;

/// 检索失败分类
#[derive(Debug, Error)]
pub enum SearchError {
    /// 瞬时失败，可以重试（限流、网络、超时）
    #[error("transient search failure: {0}")]
    Transient(String),

    /// 永久失败，重试无意义（请求非法、鉴权失败）
    #[error("permanent search failure: {0}")]
    Permanent(String),
}

/// 检索过滤条件，来自分析请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub platform: String,
    pub region: String,
    pub time_window: String,
}

/// 检索后端接口
///
/// 空结果返回`Ok(vec![])`，不是错误。
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, SearchError>;
}
