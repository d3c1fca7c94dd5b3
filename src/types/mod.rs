pub mod analysis;
pub mod chart;
pub mod document;
pub mod record;
pub mod request;

pub use analysis::{AnalysisResult, Row};
pub use chart::{ChartSpec, ChartType, Series};
pub use document::SearchHit;
pub use record::{ExtractedRecord, Scalar};
pub use request::{AnalysisRequest, AnalysisType};
