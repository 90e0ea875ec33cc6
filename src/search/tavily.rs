//! Tavily 检索客户端：超时、结果大小限制、原始网页内容清洗
//!
//! POST {base_url}/search，basic 走轻量检索；deep 请求 advanced 深度并带回 raw_content。
//! raw_content 常为 HTML，用 html2text 提取可读文本；超过 max_result_chars 时截断并追加 ...[truncated]。

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use serde_json::{json, Value};

use crate::search::{SearchClient, SearchMode};

pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Tavily 客户端：持有 reqwest Client（超时在 Client 层配置）与结果清洗参数
pub struct TavilyClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_result_chars: usize,
    max_results: usize,
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut prev_whitespace = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => {
                let is_whitespace = c.is_whitespace();
                if is_whitespace && prev_whitespace {
                    continue;
                }
                prev_whitespace = is_whitespace;
                out.push(if is_whitespace { ' ' } else { c });
            }
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

impl TavilyClient {
    pub fn new(
        api_key: &str,
        base_url: Option<&str>,
        timeout_secs: u64,
        max_result_chars: usize,
        max_results: usize,
    ) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or(TAVILY_BASE_URL).trim_end_matches('/').to_string(),
            max_result_chars,
            max_results,
        }
    }

    /// 将 HTML 转为可读文本（去除 script/style 等）
    fn html_to_text(&self, html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }

    fn clamp(&self, text: String) -> String {
        if text.chars().count() > self.max_result_chars {
            text.chars().take(self.max_result_chars).collect::<String>() + "\n...[truncated]"
        } else {
            text
        }
    }

    /// 清洗结果负载：raw_content 若为 HTML 则提取文本，所有文本字段按上限截断
    fn clean_payload(&self, mut payload: Value) -> Value {
        if let Some(results) = payload.get_mut("results").and_then(|r| r.as_array_mut()) {
            for item in results {
                for field in ["content", "raw_content"] {
                    let Some(text) = item.get(field).and_then(|v| v.as_str()) else {
                        continue;
                    };
                    let text = if looks_like_html(text) {
                        self.html_to_text(text)
                    } else {
                        text.to_string()
                    };
                    item[field] = Value::String(self.clamp(text));
                }
            }
        }
        payload
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(&self, query: &str, mode: SearchMode) -> Result<Value, String> {
        let body = json!({
            "query": query,
            "search_depth": match mode {
                SearchMode::Basic => "basic",
                SearchMode::Deep => "advanced",
            },
            "include_raw_content": matches!(mode, SearchMode::Deep),
            "include_answer": true,
            "max_results": self.max_results,
        });

        tracing::info!(query = %query, mode = mode.as_str(), "search request");

        let resp = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| format!("Read body: {}", e))?;

        Ok(self.clean_payload(payload))
    }
}
