use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SearchConfig;
use crate::search::{SearchError, SearchFilters, SearchProvider};
use crate::types::SearchHit;

/// Tavily检索后端
pub struct TavilyProvider {
    config: SearchConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    topic: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    published_date: Option<String>,
}

impl TavilyProvider {
    pub fn new(config: SearchConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, http })
    }

    /// 把过滤条件并入查询串。Tavily没有结构化过滤参数，
    /// 平台/区域/时间窗只能作为查询词传入。
    fn effective_query(query: &str, filters: &SearchFilters) -> String {
        format!(
            "{} {} {} {}",
            query, filters.platform, filters.region, filters.time_window
        )
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let body = TavilyRequest {
            api_key: &self.config.api_key,
            query: &Self::effective_query(query, filters),
            topic: "general",
            max_results: self.config.max_results,
        };

        let url = format!("{}/search", self.config.api_base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                // 连接失败与超时都按瞬时失败处理
                SearchError::Transient(e.to_string())
            })?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(SearchError::Transient(format!(
                "search backend returned {}",
                status
            )));
        }
        if status.is_client_error() {
            return Err(SearchError::Permanent(format!(
                "search backend rejected request: {}",
                status
            )));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Transient(format!("malformed search response: {}", e)))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty() || !r.content.is_empty())
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
                published_at: r.published_date,
            })
            .collect())
    }
}
