use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 分析类型 - 决定后续的聚合规则与图表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    /// 市场空缺分析：目标平台有需求但参照市场缺位的商品
    Gap,
    /// 趋势商品分析：按近期增长速度排名
    Trending,
    /// 热销商品分析：按销量代理指标排名
    TopSelling,
    /// 竞争对手分析：按品牌/卖家分组对比
    Competitor,
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisType::Gap => write!(f, "gap"),
            AnalysisType::Trending => write!(f, "trending"),
            AnalysisType::TopSelling => write!(f, "top_selling"),
            AnalysisType::Competitor => write!(f, "competitor"),
        }
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "gap" | "market_gap" => Ok(AnalysisType::Gap),
            "trending" | "trending_products" => Ok(AnalysisType::Trending),
            "top_selling" | "high_selling" | "high_selling_products" => Ok(AnalysisType::TopSelling),
            "competitor" | "competitor_analysis" => Ok(AnalysisType::Competitor),
            _ => Err(format!("Unknown analysis type: {}", s)),
        }
    }
}

/// 分析请求 - 由意图分类阶段从原始问题一次性派生，之后不再变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisRequest {
    /// 用户的原始问题
    pub question: String,

    /// 商品品类/关键词
    pub product: String,

    /// 电商平台（如 Amazon、eBay）
    pub platform: String,

    /// 区域市场（如 US、UK）
    pub region: String,

    /// 时间窗口（如 last month）
    pub time_window: String,

    /// 分析类型
    pub analysis_type: AnalysisType,
}
