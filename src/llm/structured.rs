//! 结构化输出辅助：Schema 注入与 JSON 提取解析
//!
//! 引擎请求结构化决策时，把 schemars 生成的 JSON Schema 拼入 prompt 以减少格式错误；
//! 解析时先从文本中提取 JSON 块（```json 围栏或首尾大括号），再用 serde 反序列化。
//! 解析失败返回 JsonParseError，由调用方决定是否降级为默认决策。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

use crate::core::AgentError;

/// 生成可拼入 prompt 的 JSON Schema 说明文本
pub fn schema_instructions<T: JsonSchema>() -> String {
    let schema = schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 从 LLM 输出中提取 JSON 块（```json ... ``` 或首个 { 到最后一个 }）
pub fn extract_json_block(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let inner = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        return Some(inner.trim());
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        Some(&trimmed[start..=end])
    } else {
        None
    }
}

/// 解析结构化输出为类型化决策对象
pub fn parse_structured<T: DeserializeOwned>(output: &str) -> Result<T, AgentError> {
    let json_str = extract_json_block(output).ok_or_else(|| {
        let preview: String = output.chars().take(120).collect();
        AgentError::JsonParseError(format!("no JSON object in output: {}", preview))
    })?;
    serde_json::from_str(json_str).map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))
}
