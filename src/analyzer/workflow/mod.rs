//! 工作流编排器 - 运行状态机
//!
//! 相位顺序：意图分类 → (检索 → 提取 → 置信度分支)* → 分析 → 可视化。
//! 图中唯一的环是置信度不足时回到检索，环的次数受步数预算约束，
//! 所以对任意 max_steps ≥ 1 运行必然在有限步内进入终态。
//! run()返回的永远是终态快照，错误以状态+描述收尾，不会向外抛出。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::analyzer::agents::{analysis, extraction, intent, visualization};
use crate::analyzer::context::{AnalyzerContext, memory_scope};
use crate::analyzer::error::RunError;
use crate::analyzer::ports::CompletionPort;
use crate::analyzer::state::RunState;
use crate::search::{SearchError, SearchFilters, SearchProvider};
use crate::types::{AnalysisRequest, SearchHit};

/// 创建一对取消信号端点，发送端置true即请求中止
pub fn cancel_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub struct Orchestrator {
    context: AnalyzerContext,
    search: Arc<dyn SearchProvider>,
    completion: Arc<dyn CompletionPort>,
    cancel: watch::Receiver<bool>,
}

impl Orchestrator {
    pub fn new(
        context: AnalyzerContext,
        search: Arc<dyn SearchProvider>,
        completion: Arc<dyn CompletionPort>,
    ) -> Self {
        // 默认不接取消信号；发送端随即被丢弃，等价于永不取消
        let (_tx, cancel) = watch::channel(false);
        Self {
            context,
            search,
            completion,
            cancel,
        }
    }

    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    async fn cancelled(mut cancel: watch::Receiver<bool>) {
        loop {
            if *cancel.borrow() {
                return;
            }
            if cancel.changed().await.is_err() {
                // 发送端已丢弃，永不取消
                std::future::pending::<()>().await;
            }
        }
    }

    /// 给外部调用包上取消守卫：取消信号优先于进行中的工作
    async fn guard<T>(&self, work: impl Future<Output = T>) -> Result<T, RunError> {
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = Self::cancelled(cancel) => Err(RunError::Cancelled),
            value = work => Ok(value),
        }
    }

    /// 运行一次完整分析，返回终态快照
    pub async fn run(&self, question: &str) -> RunState {
        println!("🚀 开始市场分析: {}", question);
        let workflow = self.context.config.workflow.clone();

        let request = match self
            .guard(intent::classify(self.completion.as_ref(), question))
            .await
        {
            Ok(Ok(request)) => request,
            Ok(Err(error)) => {
                eprintln!("❌ 意图分类失败: {}", error);
                return RunState::failed_without_request(error);
            }
            Err(cancelled) => return RunState::failed_without_request(cancelled),
        };

        let filters = SearchFilters {
            platform: request.platform.clone(),
            region: request.region.clone(),
            time_window: request.time_window.clone(),
        };
        let mut state = RunState::new(request.clone());

        while state.step_count < workflow.max_steps {
            state = state.begin_step();
            let step = state.step_count;

            let query = build_query(&request, &state, workflow.confidence_threshold);
            println!("🔍 第 {}/{} 步检索: {}", step, workflow.max_steps, query);

            let hits = match self.guard(self.retrieve(&query, &filters)).await {
                Ok(Ok(hits)) => hits,
                Ok(Err(error)) => {
                    eprintln!("❌ 检索失败: {}", error);
                    return state.failed(error);
                }
                Err(cancelled) => return state.failed(cancelled),
            };
            let fetched = hits.len();
            state = state.with_documents(hits);
            self.record_telemetry(
                memory_scope::RETRIEVAL,
                step,
                serde_json::json!({
                    "query": query,
                    "fetched": fetched,
                    "corpus": state.raw_documents.len(),
                }),
            )
            .await;

            let records = match self
                .guard(extraction::extract(
                    &self.context,
                    self.completion.as_ref(),
                    &request,
                    &state.raw_documents,
                ))
                .await
            {
                Ok(Ok(records)) => records,
                Ok(Err(error)) => {
                    eprintln!("❌ 提取失败: {}", error);
                    return state.failed(error);
                }
                Err(cancelled) => return state.failed(cancelled),
            };
            state = state.with_records(records);

            let confidence = state.mean_confidence();
            self.record_telemetry(
                memory_scope::EXTRACTION,
                step,
                serde_json::json!({
                    "entities": state.extracted_records.len(),
                    "mean_confidence": confidence,
                }),
            )
            .await;

            if !state.extracted_records.is_empty() && confidence >= workflow.confidence_threshold {
                let analysis_result = match self
                    .guard(analysis::analyze(
                        self.completion.as_ref(),
                        &request,
                        &state.extracted_records,
                    ))
                    .await
                {
                    Ok(result) => result,
                    Err(cancelled) => return state.failed(cancelled),
                };

                let chart = match visualization::build_chart(request.analysis_type, &analysis_result)
                {
                    Ok(chart) => Some(chart),
                    Err(e) => {
                        eprintln!("❌ 图表生成失败: {}", e);
                        None
                    }
                };

                println!(
                    "🎉 分析完成：{} 行结果，平均置信度 {:.2}",
                    analysis_result.table.len(),
                    confidence
                );
                return state.completed(analysis_result, chart);
            }

            println!(
                "⚠️ 第 {} 步平均置信度 {:.2} 低于阈值 {:.2}，扩大检索范围",
                step, confidence, workflow.confidence_threshold
            );
            state = state.needs_more_data();
        }

        eprintln!("❌ 步数预算（{}）耗尽，保留部分结果", workflow.max_steps);
        if self.context.config.verbose {
            self.dump_telemetry().await;
        }
        state.failed(RunError::StepBudgetExceeded(workflow.max_steps))
    }

    /// 检索一次，瞬时失败退避后重试一次，第二次失败升级报错
    async fn retrieve(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, RunError> {
        match self.search.search(query, filters).await {
            Ok(hits) => Ok(hits),
            Err(SearchError::Permanent(message)) => Err(RunError::Retrieval(message)),
            Err(SearchError::Transient(message)) => {
                eprintln!("⚠️ 检索瞬时失败，退避后重试: {}", message);
                tokio::time::sleep(Duration::from_millis(self.context.config.search.retry_delay_ms))
                    .await;
                self.search
                    .search(query, filters)
                    .await
                    .map_err(|e| RunError::Retrieval(e.to_string()))
            }
        }
    }

    /// 打印每一步的检索与提取遥测，便于排查为什么没能过阈值
    async fn dump_telemetry(&self) {
        for scope in [memory_scope::RETRIEVAL, memory_scope::EXTRACTION] {
            for key in self.context.list_memory_keys(scope).await {
                if let Some(snapshot) = self
                    .context
                    .get_from_memory::<serde_json::Value>(scope, &key)
                    .await
                {
                    eprintln!("  · {}:{} {}", scope, key, snapshot);
                }
            }
        }
    }

    async fn record_telemetry(&self, scope: &str, step: u32, data: serde_json::Value) {
        if let Err(e) = self
            .context
            .store_to_memory(scope, &format!("step-{}", step), data)
            .await
        {
            eprintln!("⚠️ 写入运行遥测失败: {}", e);
        }
    }
}

/// 构造本步的检索查询
///
/// 首轮由商品与分析类型构成基础查询；后续轮把低置信度实体名
/// （字典序前3个）并入查询，定向补充它们的材料
fn build_query(request: &AnalysisRequest, state: &RunState, confidence_threshold: f64) -> String {
    let base = format!("{} {} market analysis", request.product, request.analysis_type);
    if state.step_count <= 1 {
        return base;
    }

    let weak_entities: Vec<&str> = state
        .extracted_records
        .values()
        .filter(|record| record.confidence < confidence_threshold)
        .map(|record| record.entity_name.as_str())
        .take(3)
        .collect();
    if weak_entities.is_empty() {
        format!("{} pricing reviews demand", base)
    } else {
        format!("{} {} details", base, weak_entities.join(" "))
    }
}

#[cfg(test)]
mod tests;
