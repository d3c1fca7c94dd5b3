use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// 检索命中 - 检索后端返回的单条原始材料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 发布时间，后端未提供时为None
    pub published_at: Option<String>,
}

impl SearchHit {
    /// 内容指纹，用于跨检索轮次去重，避免重复材料扭曲置信度
    pub fn fingerprint(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.url.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.snippet.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
