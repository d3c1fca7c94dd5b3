use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::memory::Memory;

/// 记忆作用域
pub mod memory_scope {
    /// 每一步的检索遥测
    pub const RETRIEVAL: &str = "retrieval";
    /// 每一步的提取遥测
    pub const EXTRACTION: &str = "extraction";
}

/// 工作流上下文 - 配置与运行期记忆的共享句柄
#[derive(Clone)]
pub struct AnalyzerContext {
    pub config: Config,
    memory: Arc<RwLock<Memory>>,
}

impl AnalyzerContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            memory: Arc::new(RwLock::new(Memory::new())),
        }
    }

    /// 写入一份阶段遥测快照
    pub async fn store_to_memory<T: Serialize>(
        &self,
        scope: &str,
        key: &str,
        data: T,
    ) -> Result<()> {
        let mut memory = self.memory.write().await;
        memory.store(scope, key, data)
    }

    pub async fn get_from_memory<T: for<'a> Deserialize<'a>>(
        &self,
        scope: &str,
        key: &str,
    ) -> Option<T> {
        let memory = self.memory.read().await;
        memory.get(scope, key)
    }

    pub async fn list_memory_keys(&self, scope: &str) -> Vec<String> {
        let memory = self.memory.read().await;
        memory.list_keys(scope)
    }
}
