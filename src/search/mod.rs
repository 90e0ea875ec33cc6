//! 检索层：联网搜索客户端抽象与实现（Tavily / Mock）
//!
//! basic 为轻量检索；deep 请求 advanced 深度并附带原始网页内容，
//! 适合在同一话题的 basic 检索不够用之后再用，不作为首次检索。

pub mod mock;
pub mod tavily;

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use mock::MockSearchClient;
pub use tavily::TavilyClient;

use crate::config::AppConfig;

/// 检索深度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Basic,
    Deep,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Basic => "basic",
            SearchMode::Deep => "deep",
        }
    }
}

/// 检索客户端 trait：按关键词查询网页索引，返回原始结果负载
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, mode: SearchMode) -> Result<Value, String>;
}

/// 根据环境变量选择检索后端（Tavily / Mock）
pub fn create_search_client(cfg: &AppConfig) -> Arc<dyn SearchClient> {
    match std::env::var("TAVILY_API_KEY") {
        Ok(key) => {
            tracing::info!("Using Tavily search");
            Arc::new(TavilyClient::new(
                &key,
                cfg.search.base_url.as_deref(),
                cfg.search.timeout_secs,
                cfg.search.max_result_chars,
                cfg.search.max_results,
            ))
        }
        Err(_) => {
            tracing::warn!("TAVILY_API_KEY not set, using mock search");
            Arc::new(MockSearchClient)
        }
    }
}
