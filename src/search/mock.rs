//! Mock 检索客户端（用于测试与无 API Key 的本地运行）

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::search::{SearchClient, SearchMode};

/// Mock 客户端：返回固定形状的结果负载，便于离线跑通检索分支
#[derive(Debug, Default)]
pub struct MockSearchClient;

#[async_trait]
impl SearchClient for MockSearchClient {
    async fn search(&self, query: &str, mode: SearchMode) -> Result<Value, String> {
        Ok(json!({
            "query": query,
            "search_depth": mode.as_str(),
            "results": [
                {
                    "title": "mock result",
                    "url": "https://example.com/",
                    "content": format!("[mock search results for: {}]", query),
                }
            ],
        }))
    }
}
