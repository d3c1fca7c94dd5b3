use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::analyzer::error::RunError;
use crate::analyzer::ports::{IntentFields, Narrative, RecordBatch};
use crate::analyzer::state::RunStatus;
use crate::config::Config;
use crate::types::{ExtractedRecord, Row, Scalar};

fn test_config(max_steps: u32) -> Config {
    let mut config = Config::default();
    config.workflow.max_steps = max_steps;
    config.search.retry_delay_ms = 1;
    config
}

fn hit(url: &str, snippet: &str) -> SearchHit {
    SearchHit {
        title: "doc".to_string(),
        url: url.to_string(),
        snippet: snippet.to_string(),
        published_at: None,
    }
}

fn record(name: &str, confidence: f64, attrs: &[(&str, Scalar)]) -> ExtractedRecord {
    let mut attributes = BTreeMap::new();
    for (key, value) in attrs {
        attributes.insert((*key).to_string(), value.clone());
    }
    ExtractedRecord {
        entity_name: name.to_string(),
        attributes,
        confidence,
    }
}

/// 每次调用按脚本出队；脚本耗尽后返回空结果
struct ScriptedSearch {
    script: Mutex<VecDeque<Result<Vec<SearchHit>, SearchError>>>,
    calls: AtomicUsize,
}

impl ScriptedSearch {
    fn new(script: Vec<Result<Vec<SearchHit>, SearchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(
        &self,
        _query: &str,
        _filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// 固定意图 + 固定提取输出的补全服务桩
struct MockCompletion {
    analysis_type: &'static str,
    records: Vec<ExtractedRecord>,
    fail_intent: bool,
}

impl MockCompletion {
    fn with_records(analysis_type: &'static str, records: Vec<ExtractedRecord>) -> Self {
        Self {
            analysis_type,
            records,
            fail_intent: false,
        }
    }
}

#[async_trait]
impl CompletionPort for MockCompletion {
    async fn classify_intent(&self, _question: &str) -> Result<IntentFields> {
        if self.fail_intent {
            return Err(anyhow!("intent service down"));
        }
        Ok(IntentFields {
            product: "wireless earbuds".to_string(),
            platform: "Amazon".to_string(),
            region: "US".to_string(),
            time_window: "last month".to_string(),
            analysis_type: self.analysis_type.to_string(),
        })
    }

    async fn extract_records(
        &self,
        _request: &AnalysisRequest,
        _documents: &[SearchHit],
    ) -> Result<RecordBatch> {
        Ok(RecordBatch {
            records: self.records.clone(),
        })
    }

    async fn narrate(&self, _request: &AnalysisRequest, table: &[Row]) -> Result<Narrative> {
        Ok(Narrative {
            summary: format!("{} entries analysed.", table.len()),
            recommendations: vec!["act on the leader".to_string()],
        })
    }
}

fn orchestrator(
    config: Config,
    search: Arc<dyn SearchProvider>,
    completion: Arc<dyn CompletionPort>,
) -> Orchestrator {
    Orchestrator::new(AnalyzerContext::new(config), search, completion)
}

#[tokio::test]
async fn test_gap_run_completes_with_all_products() {
    // 目标平台有5份材料、参照市场为空，5个商品都应算作空缺
    let docs: Vec<SearchHit> = (1..=5)
        .map(|i| hit(&format!("https://amazon.example/{}", i), "demand signal"))
        .collect();
    let records: Vec<ExtractedRecord> = (1..=5)
        .map(|i| {
            record(
                &format!("Product {}", i),
                0.9,
                &[("demand_score", Scalar::Number(60.0 + i as f64))],
            )
        })
        .collect();

    let search = Arc::new(ScriptedSearch::new(vec![Ok(docs)]));
    let completion = Arc::new(MockCompletion::with_records("gap", records));
    let state = orchestrator(test_config(5), search, completion)
        .run("Find a market gap for 'wireless earbuds' on 'Amazon' in 'US' for 'last month'")
        .await;

    assert_eq!(state.status, RunStatus::Complete);
    assert_eq!(state.step_count, 1);
    let result = state.analysis_result.as_ref().unwrap();
    assert_eq!(result.table.len(), 5);
    // 需求分最高者居首
    assert_eq!(
        result.table[0].get("entity_name").unwrap().as_text(),
        Some("Product 5")
    );
    let chart = state.chart_spec.as_ref().unwrap();
    assert_eq!(chart.series.len(), 5);
}

#[tokio::test]
async fn test_malformed_records_exhaust_budget() {
    // 提取输出全部非法，记录集始终为空，预算耗尽后以软失败收尾
    let search = Arc::new(ScriptedSearch::new(vec![
        Ok(vec![hit("https://a", "x")]),
        Ok(vec![hit("https://b", "y")]),
    ]));
    let completion = Arc::new(MockCompletion::with_records(
        "gap",
        vec![record("", 0.9, &[]), record("bad", 1.7, &[])],
    ));
    let state = orchestrator(test_config(2), search, completion)
        .run("Find a market gap for 'earbuds'")
        .await;

    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.error, Some(RunError::StepBudgetExceeded(2)));
    assert!(state.extracted_records.is_empty());
    assert!(state.analysis_result.is_none());
}

#[tokio::test]
async fn test_empty_retrieval_fails_after_exactly_max_steps() {
    let search = Arc::new(ScriptedSearch::new(vec![]));
    let completion = Arc::new(MockCompletion::with_records("gap", vec![]));
    let orchestrator = orchestrator(test_config(3), search.clone(), completion);
    let state = orchestrator.run("Find a market gap for 'earbuds'").await;

    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.error, Some(RunError::StepBudgetExceeded(3)));
    assert_eq!(state.step_count, 3);
    assert_eq!(search.call_count(), 3);
}

#[tokio::test]
async fn test_transient_retrieval_retried_once_then_fatal() {
    let search = Arc::new(ScriptedSearch::new(vec![
        Err(SearchError::Transient("rate limited".to_string())),
        Err(SearchError::Transient("rate limited again".to_string())),
    ]));
    let completion = Arc::new(MockCompletion::with_records("gap", vec![]));
    let orchestrator = orchestrator(test_config(5), search.clone(), completion);
    let state = orchestrator.run("Find a market gap for 'earbuds'").await;

    assert_eq!(state.status, RunStatus::Failed);
    assert!(matches!(state.error, Some(RunError::Retrieval(_))));
    assert_eq!(search.call_count(), 2);
    assert_eq!(state.step_count, 1);
    assert!(state.analysis_result.is_none());
}

#[tokio::test]
async fn test_transient_retrieval_recovers_on_retry() {
    let search = Arc::new(ScriptedSearch::new(vec![
        Err(SearchError::Transient("blip".to_string())),
        Ok(vec![hit("https://a", "demand signal")]),
    ]));
    let completion = Arc::new(MockCompletion::with_records(
        "gap",
        vec![record("Solo", 0.9, &[("demand_score", Scalar::Number(70.0))])],
    ));
    let state = orchestrator(test_config(5), search, completion)
        .run("Find a market gap for 'earbuds'")
        .await;

    assert_eq!(state.status, RunStatus::Complete);
}

#[tokio::test]
async fn test_permanent_retrieval_failure_not_retried() {
    let search = Arc::new(ScriptedSearch::new(vec![Err(SearchError::Permanent(
        "bad api key".to_string(),
    ))]));
    let completion = Arc::new(MockCompletion::with_records("gap", vec![]));
    let orchestrator = orchestrator(test_config(5), search.clone(), completion);
    let state = orchestrator.run("Find a market gap for 'earbuds'").await;

    assert_eq!(state.status, RunStatus::Failed);
    assert!(matches!(state.error, Some(RunError::Retrieval(_))));
    assert_eq!(search.call_count(), 1);
}

#[tokio::test]
async fn test_low_confidence_loops_then_succeeds() {
    // 第一轮置信度不足触发回环，材料补充后第二轮过阈值
    struct ImprovingCompletion {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionPort for ImprovingCompletion {
        async fn classify_intent(&self, _question: &str) -> Result<IntentFields> {
            Ok(IntentFields {
                product: "earbuds".to_string(),
                platform: "Amazon".to_string(),
                region: "US".to_string(),
                time_window: "last month".to_string(),
                analysis_type: "trending".to_string(),
            })
        }

        async fn extract_records(
            &self,
            _request: &AnalysisRequest,
            _documents: &[SearchHit],
        ) -> Result<RecordBatch> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let confidence = if call == 0 { 0.3 } else { 0.9 };
            Ok(RecordBatch {
                records: vec![record(
                    "Riser",
                    confidence,
                    &[("velocity", Scalar::Number(8.0))],
                )],
            })
        }

        async fn narrate(&self, _request: &AnalysisRequest, _table: &[Row]) -> Result<Narrative> {
            Ok(Narrative {
                summary: "rising fast".to_string(),
                recommendations: vec![],
            })
        }
    }

    let search = Arc::new(ScriptedSearch::new(vec![
        Ok(vec![hit("https://a", "weak signal")]),
        Ok(vec![hit("https://b", "strong signal")]),
    ]));
    let completion = Arc::new(ImprovingCompletion {
        calls: AtomicUsize::new(0),
    });
    let state = orchestrator(test_config(5), search, completion)
        .run("What's trending for 'earbuds'?")
        .await;

    assert_eq!(state.status, RunStatus::Complete);
    assert_eq!(state.step_count, 2);
    assert_eq!(state.raw_documents.len(), 2);
}

#[tokio::test]
async fn test_classification_failure_is_fatal_without_retry() {
    let search = Arc::new(ScriptedSearch::new(vec![]));
    let completion = Arc::new(MockCompletion {
        analysis_type: "gap",
        records: vec![],
        fail_intent: true,
    });
    let orchestrator = orchestrator(test_config(5), search.clone(), completion);
    // 规则解析也推不出分析类型
    let state = orchestrator.run("What's the weather like tomorrow?").await;

    assert_eq!(state.status, RunStatus::Failed);
    assert!(matches!(state.error, Some(RunError::Classification(_))));
    assert!(state.request.is_none());
    assert_eq!(state.step_count, 0);
    assert_eq!(search.call_count(), 0);
}

#[tokio::test]
async fn test_cancellation_preempts_work() {
    let search = Arc::new(ScriptedSearch::new(vec![Ok(vec![hit("https://a", "x")])]));
    let completion = Arc::new(MockCompletion::with_records("gap", vec![]));
    let (tx, rx) = cancel_channel();
    tx.send(true).unwrap();

    let state = orchestrator(test_config(5), search, completion)
        .with_cancellation(rx)
        .run("Find a market gap for 'earbuds'")
        .await;

    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.error, Some(RunError::Cancelled));
}

#[tokio::test]
async fn test_extraction_service_failure_fails_run() {
    // 补全服务耗尽重试仍失败：运行以提取错误收尾，已检索的材料保留
    struct BrokenExtraction;

    #[async_trait]
    impl CompletionPort for BrokenExtraction {
        async fn classify_intent(&self, _question: &str) -> Result<IntentFields> {
            Ok(IntentFields {
                product: "earbuds".to_string(),
                platform: "Amazon".to_string(),
                region: "US".to_string(),
                time_window: "last month".to_string(),
                analysis_type: "gap".to_string(),
            })
        }

        async fn extract_records(
            &self,
            _request: &AnalysisRequest,
            _documents: &[SearchHit],
        ) -> Result<RecordBatch> {
            Err(anyhow!("completion service down"))
        }

        async fn narrate(&self, _request: &AnalysisRequest, _table: &[Row]) -> Result<Narrative> {
            Err(anyhow!("not used"))
        }
    }

    let search = Arc::new(ScriptedSearch::new(vec![Ok(vec![hit("https://a", "x")])]));
    let state = orchestrator(test_config(5), search, Arc::new(BrokenExtraction))
        .run("Find a market gap for 'earbuds'")
        .await;

    assert_eq!(state.status, RunStatus::Failed);
    assert!(matches!(state.error, Some(RunError::ExtractionService(_))));
    assert_eq!(state.step_count, 1);
    assert_eq!(state.raw_documents.len(), 1);
    assert!(state.extracted_records.is_empty());
    assert!(state.analysis_result.is_none());
}

#[tokio::test]
async fn test_cancellation_mid_loop_after_retrieval() {
    // 取消信号在检索返回前发出：本轮检索照常收尾，
    // 下一个受守卫的阶段（提取）检测到信号并终止运行
    struct CancellingSearch {
        cancel_tx: watch::Sender<bool>,
    }

    #[async_trait]
    impl SearchProvider for CancellingSearch {
        async fn search(
            &self,
            _query: &str,
            _filters: &SearchFilters,
        ) -> Result<Vec<SearchHit>, SearchError> {
            let _ = self.cancel_tx.send(true);
            Ok(vec![hit("https://a", "demand signal")])
        }
    }

    let (cancel_tx, cancel_rx) = cancel_channel();
    let completion = Arc::new(MockCompletion::with_records(
        "gap",
        vec![record("Solo", 0.9, &[("demand_score", Scalar::Number(70.0))])],
    ));
    let state = orchestrator(
        test_config(5),
        Arc::new(CancellingSearch { cancel_tx }),
        completion,
    )
    .with_cancellation(cancel_rx)
    .run("Find a market gap for 'earbuds'")
    .await;

    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.error, Some(RunError::Cancelled));
    assert_eq!(state.step_count, 1);
    // 检索已完成的材料保留在终态快照里
    assert_eq!(state.raw_documents.len(), 1);
    assert!(state.extracted_records.is_empty());
}

#[tokio::test]
async fn test_budget_failure_preserves_partial_records() {
    // 置信度始终低于阈值：记录保留在终态里供诊断
    let search = Arc::new(ScriptedSearch::new(vec![Ok(vec![hit("https://a", "x")])]));
    let completion = Arc::new(MockCompletion::with_records(
        "trending",
        vec![record("Weak", 0.2, &[("velocity", Scalar::Number(1.0))])],
    ));
    let state = orchestrator(test_config(2), search, completion)
        .run("What's trending for 'earbuds'?")
        .await;

    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.error, Some(RunError::StepBudgetExceeded(2)));
    assert_eq!(state.extracted_records.len(), 1);
    assert!(state.extracted_records.contains_key("Weak"));
}

#[test]
fn test_build_query_broadens_with_weak_entities() {
    let request = AnalysisRequest {
        question: "q".to_string(),
        product: "earbuds".to_string(),
        platform: "Amazon".to_string(),
        region: "US".to_string(),
        time_window: "last month".to_string(),
        analysis_type: crate::types::AnalysisType::Gap,
    };

    let first = RunState::new(request.clone()).begin_step();
    assert_eq!(build_query(&request, &first, 0.6), "earbuds gap market analysis");

    let mut records = BTreeMap::new();
    records.insert(
        "Foggy".to_string(),
        record("Foggy", 0.2, &[]),
    );
    records.insert(
        "Solid".to_string(),
        record("Solid", 0.9, &[]),
    );
    let second = RunState::new(request.clone())
        .begin_step()
        .with_records(records)
        .needs_more_data()
        .begin_step();
    let query = build_query(&request, &second, 0.6);
    assert!(query.contains("Foggy"));
    assert!(!query.contains("Solid"));
}
