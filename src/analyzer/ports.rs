//! 智能体对外部补全服务的接口
//!
//! 工作流只依赖这里的trait，生产实现走rig的结构化提取，
//! 测试用桩实现注入确定性的响应。

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::llm::client::LLMClient;
use crate::types::{AnalysisRequest, AnalysisType, ExtractedRecord, Row, Scalar, SearchHit};

/// 意图分类的结构化输出
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentFields {
    /// 商品品类/关键词，如 "wireless earbuds"
    pub product: String,
    /// 电商平台，如 "Amazon"
    pub platform: String,
    /// 区域市场，如 "US"
    pub region: String,
    /// 时间窗口，如 "last month"
    pub time_window: String,
    /// 分析类型，取值：gap / trending / top_selling / competitor
    pub analysis_type: String,
}

/// 一批文档的提取输出
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecordBatch {
    pub records: Vec<ExtractedRecord>,
}

/// 叙事生成的结构化输出
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Narrative {
    /// 两到四句话的结论摘要
    pub summary: String,
    /// 面向卖家的行动建议
    pub recommendations: Vec<String>,
}

/// 补全服务端口
#[async_trait]
pub trait CompletionPort: Send + Sync {
    /// 从自然语言问题中分类出结构化的分析请求字段
    async fn classify_intent(&self, question: &str) -> Result<IntentFields>;

    /// 从一批检索文档中提取市场实体记录
    async fn extract_records(
        &self,
        request: &AnalysisRequest,
        documents: &[SearchHit],
    ) -> Result<RecordBatch>;

    /// 基于聚合表生成摘要与建议
    async fn narrate(&self, request: &AnalysisRequest, table: &[Row]) -> Result<Narrative>;
}

/// 各分析类型期望提取的属性词表
fn attribute_hint(analysis_type: AnalysisType) -> &'static str {
    match analysis_type {
        AnalysisType::Gap => {
            "demand_score (0-100 number), competition (Low/Medium/High), opportunity (text), \
             market_size (text), available_elsewhere (boolean, true if the product is already \
             widely available on the target platform)"
        }
        AnalysisType::Trending => {
            "velocity (number, recent growth speed), growth (text, e.g. +45%), \
             interest_level (text)"
        }
        AnalysisType::TopSelling => {
            "sales_proxy (number, sales volume proxy), revenue (text), rating (number 0-5), \
             reviews (number)"
        }
        AnalysisType::Competitor => {
            "brand (text, owning brand or seller), market_share (number, percent), \
             rating (number 0-5), strength (text), weakness (text)"
        }
    }
}

/// 生产实现：把端口调用映射到LLM结构化提取
pub struct RigCompletionPort {
    llm: LLMClient,
}

impl RigCompletionPort {
    pub fn new(llm: LLMClient) -> Self {
        Self { llm }
    }

    fn format_documents(documents: &[SearchHit]) -> String {
        documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                format!(
                    "[{}] {}\nURL: {}\nDate: {}\n{}",
                    i + 1,
                    doc.title,
                    doc.url,
                    doc.published_at.as_deref().unwrap_or("unknown"),
                    doc.snippet
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn format_table(table: &[Row]) -> String {
        table
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(key, value)| match value {
                        Scalar::Text(text) => format!("{}={}", key, text),
                        Scalar::Number(number) => format!("{}={}", key, number),
                        Scalar::Bool(flag) => format!("{}={}", key, flag),
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl CompletionPort for RigCompletionPort {
    async fn classify_intent(&self, question: &str) -> Result<IntentFields> {
        let system_prompt = "You are a market research intake assistant. \
            Read the user's question and fill every field. \
            analysis_type must be one of: gap, trending, top_selling, competitor. \
            When the question does not state a field, use these defaults: \
            platform Amazon, region US, time_window last month, product products.";

        self.llm.extract::<IntentFields>(system_prompt, question).await
    }

    async fn extract_records(
        &self,
        request: &AnalysisRequest,
        documents: &[SearchHit],
    ) -> Result<RecordBatch> {
        let system_prompt = format!(
            "You are a market data extraction assistant. \
             From the documents extract one record per distinct product or brand relevant to \
             '{}' on {} in {}. For each record set entity_name, a confidence between 0.0 and 1.0 \
             reflecting how well the documents support it, and these attributes when present: {}. \
             Skip entities the documents do not actually mention.",
            request.product,
            request.platform,
            request.region,
            attribute_hint(request.analysis_type)
        );

        let user_prompt = Self::format_documents(documents);
        self.llm.extract::<RecordBatch>(&system_prompt, &user_prompt).await
    }

    async fn narrate(&self, request: &AnalysisRequest, table: &[Row]) -> Result<Narrative> {
        let system_prompt = format!(
            "You are a market research analyst writing for an e-commerce seller. \
             Given a {} analysis table for '{}' on {} in {} ({}), write a 2-4 sentence summary \
             of the key findings and 2-4 concrete recommendations. \
             Only reference entities present in the table.",
            request.analysis_type,
            request.product,
            request.platform,
            request.region,
            request.time_window
        );

        let user_prompt = Self::format_table(table);
        self.llm.extract::<Narrative>(&system_prompt, &user_prompt).await
    }
}
