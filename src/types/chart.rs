use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 图表类型 - 由分析类型固定映射得到
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
}

/// 单条数据系列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Series {
    pub label: String,
    pub values: Vec<f64>,
}

/// 声明式图表规格 - 与渲染器无关，仅描述图表类型与数据系列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChartSpec {
    pub chart_type: ChartType,
    pub series: Vec<Series>,
}
