//! MarketScope - 面向电商卖家的多步市场调研分析引擎
//!
//! 把一个自然语言问题（市场空缺、趋势、热销、竞对）编排成
//! 意图分类 → 检索 → 结构化提取 → 确定性分析 → 图表规格 的流水线，
//! 结果落盘为JSON报告。

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod llm;
pub mod memory;
pub mod search;
pub mod types;
pub mod utils;
