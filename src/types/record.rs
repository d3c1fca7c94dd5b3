use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 标量值 - 提取记录属性表中允许的取值类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// 以数字视角读取，文本无法解析时返回None
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
            Scalar::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// 结构化提取记录 - LLM从原始检索材料中抽取出的单个市场实体
///
/// confidence驱动工作流中"继续检索"与"进入分析"的分支决策。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedRecord {
    /// 实体名称（商品名或品牌名）
    pub entity_name: String,

    /// 属性表，键为属性名，值为标量
    pub attributes: BTreeMap<String, Scalar>,

    /// 提取置信度，取值范围[0,1]
    pub confidence: f64,
}

impl ExtractedRecord {
    /// 校验记录是否满足Schema约束，非法记录会被提取Agent丢弃而非中断批次
    pub fn is_valid(&self) -> bool {
        !self.entity_name.trim().is_empty()
            && self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
    }

    /// 读取数字属性，依次尝试备选键名
    pub fn numeric_attr(&self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .find_map(|key| self.attributes.get(*key).and_then(Scalar::as_number))
    }
}
