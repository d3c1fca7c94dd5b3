//! 意图分类Agent - 把自然语言问题转成结构化分析请求
//!
//! 优先走LLM分类；LLM不可用或返回无法识别的分析类型时，
//! 退化到基于规则的解析。两条路都推不出分析类型才算分类失败，
//! 分类失败致命且不重试。

use regex::Regex;

use crate::analyzer::error::RunError;
use crate::analyzer::ports::CompletionPort;
use crate::types::{AnalysisRequest, AnalysisType};

const DEFAULT_PRODUCT: &str = "products";
const DEFAULT_PLATFORM: &str = "Amazon";
const DEFAULT_REGION: &str = "US";
const DEFAULT_TIME_WINDOW: &str = "last month";

pub async fn classify(
    port: &dyn CompletionPort,
    question: &str,
) -> Result<AnalysisRequest, RunError> {
    println!("🧠 正在解析分析意图...");

    match port.classify_intent(question).await {
        Ok(fields) => match fields.analysis_type.parse::<AnalysisType>() {
            Ok(analysis_type) => {
                let request = AnalysisRequest {
                    question: question.to_string(),
                    product: non_empty(fields.product, DEFAULT_PRODUCT),
                    platform: non_empty(fields.platform, DEFAULT_PLATFORM),
                    region: non_empty(fields.region, DEFAULT_REGION),
                    time_window: non_empty(fields.time_window, DEFAULT_TIME_WINDOW),
                    analysis_type,
                };
                println!(
                    "✅ 意图: {} / '{}' on {} in {}",
                    request.analysis_type, request.product, request.platform, request.region
                );
                Ok(request)
            }
            Err(_) => {
                eprintln!(
                    "⚠️ 模型返回了未知的分析类型 '{}'，回退到规则解析",
                    fields.analysis_type
                );
                fallback_parse(question)
            }
        },
        Err(e) => {
            eprintln!("⚠️ 意图分类服务不可用，回退到规则解析: {}", e);
            fallback_parse(question)
        }
    }
}

fn non_empty(value: String, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// 规则解析：分析类型靠关键词，其余字段靠引号捕获
///
/// 约定的问题形态类似：
/// "Find a market gap for 'earbuds' on 'Amazon' in 'US' for 'last month'"
fn fallback_parse(question: &str) -> Result<AnalysisRequest, RunError> {
    let analysis_type = detect_analysis_type(question).ok_or_else(|| {
        RunError::Classification(format!(
            "could not infer analysis type from question: {}",
            question
        ))
    })?;

    let quoted_for = capture_all(r#"for ['"]([^'"]+)['"]"#, question);
    let product = quoted_for
        .first()
        .cloned()
        .unwrap_or_else(|| DEFAULT_PRODUCT.to_string());
    let time_window = quoted_for
        .get(1)
        .cloned()
        .unwrap_or_else(|| DEFAULT_TIME_WINDOW.to_string());
    let platform = capture_first(r#"on ['"]([^'"]+)['"]"#, question)
        .unwrap_or_else(|| DEFAULT_PLATFORM.to_string());
    let region = capture_first(r#"in ['"]([^'"]+)['"]"#, question)
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    Ok(AnalysisRequest {
        question: question.to_string(),
        product,
        platform,
        region,
        time_window,
        analysis_type,
    })
}

fn detect_analysis_type(question: &str) -> Option<AnalysisType> {
    let lower = question.to_lowercase();
    if lower.contains("gap") {
        Some(AnalysisType::Gap)
    } else if lower.contains("trending") || lower.contains("trend") {
        Some(AnalysisType::Trending)
    } else if lower.contains("top selling")
        || lower.contains("top-selling")
        || lower.contains("high selling")
        || lower.contains("best selling")
    {
        Some(AnalysisType::TopSelling)
    } else if lower.contains("competitor") || lower.contains("competition") {
        Some(AnalysisType::Competitor)
    } else {
        None
    }
}

fn capture_first(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn capture_all(pattern: &str, text: &str) -> Vec<String> {
    match Regex::new(pattern) {
        Ok(re) => re
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}
