//! 端到端集成测试：桩住外部服务，走完整条流水线并验证持久化回读

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use marketscope_rs::analyzer::outlet::{AnalysisReport, DiskOutlet, Outlet};
use marketscope_rs::analyzer::ports::{CompletionPort, IntentFields, Narrative, RecordBatch};
use marketscope_rs::analyzer::workflow::Orchestrator;
use marketscope_rs::analyzer::{self, AnalyzerContext, RunStatus};
use marketscope_rs::config::Config;
use marketscope_rs::search::{SearchError, SearchFilters, SearchProvider};
use marketscope_rs::types::{
    AnalysisRequest, ChartType, ExtractedRecord, Row, Scalar, SearchHit,
};

struct FixedSearch;

#[async_trait]
impl SearchProvider for FixedSearch {
    async fn search(
        &self,
        _query: &str,
        _filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, SearchError> {
        Ok(vec![
            SearchHit {
                title: "Earbuds market roundup".to_string(),
                url: "https://market.example/roundup".to_string(),
                snippet: "demand for niche earbuds keeps climbing".to_string(),
                published_at: Some("2026-08-01".to_string()),
            },
            SearchHit {
                title: "Seller weekly".to_string(),
                url: "https://market.example/weekly".to_string(),
                snippet: "two products dominate searches".to_string(),
                published_at: None,
            },
        ])
    }
}

struct FixedCompletion;

#[async_trait]
impl CompletionPort for FixedCompletion {
    async fn classify_intent(&self, _question: &str) -> Result<IntentFields> {
        Ok(IntentFields {
            product: "wireless earbuds".to_string(),
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
        let mut high = BTreeMap::new();
        high.insert("demand_score".to_string(), Scalar::Number(88.0));
        high.insert("competition".to_string(), Scalar::Text("Low".to_string()));
        let mut low = BTreeMap::new();
        low.insert("demand_score".to_string(), Scalar::Number(64.0));

        Ok(RecordBatch {
            records: vec![
                ExtractedRecord {
                    entity_name: "NicheBuds Mini".to_string(),
                    attributes: high,
                    confidence: 0.9,
                },
                ExtractedRecord {
                    entity_name: "AquaPods Sport".to_string(),
                    attributes: low,
                    confidence: 0.8,
                },
            ],
        })
    }

    async fn narrate(&self, request: &AnalysisRequest, table: &[Row]) -> Result<Narrative> {
        Ok(Narrative {
            summary: format!(
                "{} gap candidates found for {} on {}.",
                table.len(),
                request.product,
                request.platform
            ),
            recommendations: vec!["Prioritise NicheBuds Mini.".to_string()],
        })
    }
}

fn config_in(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.results_dir = dir.to_path_buf();
    config
}

#[tokio::test]
async fn test_full_pipeline_persist_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let orchestrator = Orchestrator::new(
        AnalyzerContext::new(config.clone()),
        Arc::new(FixedSearch),
        Arc::new(FixedCompletion),
    );
    let state = orchestrator
        .run("Find a market gap for 'wireless earbuds' on 'Amazon' in 'US' for 'last month'")
        .await;

    assert_eq!(state.status, RunStatus::Complete);
    assert_eq!(state.step_count, 1);

    let result = state.analysis_result.as_ref().unwrap();
    assert_eq!(result.table.len(), 2);
    assert_eq!(
        result.table[0].get("entity_name").and_then(Scalar::as_text),
        Some("NicheBuds Mini")
    );
    let chart = state.chart_spec.as_ref().unwrap();
    assert_eq!(chart.chart_type, ChartType::Bar);
    assert_eq!(chart.series[0].values, vec![88.0]);

    // 落盘后回读，报告应结构一致
    let outlet = DiskOutlet::new(&config);
    let report = AnalysisReport::from(&state);
    outlet.save(&report).await.unwrap();

    let reloaded = analyzer::load_last(&config).unwrap();
    assert_eq!(reloaded.status, RunStatus::Complete);
    assert_eq!(reloaded.table, report.table);
    assert_eq!(reloaded.summary, report.summary);
    assert_eq!(reloaded.recommendations, report.recommendations);
    assert_eq!(reloaded.chart_spec, report.chart_spec);
    assert_eq!(
        reloaded.request.as_ref().map(|r| r.product.as_str()),
        Some("wireless earbuds")
    );
}

#[tokio::test]
async fn test_failed_run_is_persisted_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.workflow.max_steps = 2;
    config.search.retry_delay_ms = 1;

    struct EmptySearch;

    #[async_trait]
    impl SearchProvider for EmptySearch {
        async fn search(
            &self,
            _query: &str,
            _filters: &SearchFilters,
        ) -> Result<Vec<SearchHit>, SearchError> {
            Ok(Vec::new())
        }
    }

    let orchestrator = Orchestrator::new(
        AnalyzerContext::new(config.clone()),
        Arc::new(EmptySearch),
        Arc::new(FixedCompletion),
    );
    let state = orchestrator.run("Find a market gap for 'ghost product'").await;
    assert_eq!(state.status, RunStatus::Failed);

    let outlet = DiskOutlet::new(&config);
    outlet.save(&AnalysisReport::from(&state)).await.unwrap();

    let reloaded = analyzer::load_last(&config).unwrap();
    assert_eq!(reloaded.status, RunStatus::Failed);
    assert!(reloaded.error.is_some());
    assert!(reloaded.table.is_empty());
}

#[test]
fn test_load_last_without_history_returns_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let report = analyzer::load_last(&config_in(dir.path())).unwrap();
    assert!(report.request.is_none());
    assert!(report.summary.contains("no saved results"));
}
