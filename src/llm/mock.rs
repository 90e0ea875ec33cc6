//! Mock 补全客户端（用于测试与无 API Key 的本地运行）
//!
//! 若 prompt 要求结构化决策（含 final_decision 字段说明），返回 finalize 决策 JSON，
//! 否则回显最后一条 User 消息，保证离线也能跑完整个工作流并拿到最终回答。

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{CompletionClient, TokenStream};
use crate::memory::{Message, Role};

/// Mock 客户端：结构化请求一律选 finalize，自由文本回显问题
#[derive(Debug, Default)]
pub struct MockCompletionClient;

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let wants_decision = messages.iter().any(|m| m.content.contains("final_decision"));
        if wants_decision {
            return Ok(r#"{"search_query": "", "final_decision": "finalize"}"#.to_string());
        }

        // 优先回显最后一条 User 消息；纯 system prompt（如定稿阶段）时回显其内容
        let last = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .or_else(|| messages.last())
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Mock reply to: {}", last))
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, String> {
        // 切成小段模拟逐 Token 输出
        let content = self.complete(messages).await?;
        let chunks: Vec<Result<String, String>> = content
            .chars()
            .collect::<Vec<_>>()
            .chunks(6)
            .map(|c| Ok(c.iter().collect::<String>()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_structured_request_gets_finalize() {
        let mock = MockCompletionClient;
        let messages = vec![Message::system("respond with final_decision JSON")];
        let out = mock.complete(&messages).await.unwrap();
        assert!(out.contains("finalize"));
    }

    #[tokio::test]
    async fn test_free_text_echoes_question() {
        let mock = MockCompletionClient;
        let messages = vec![Message::user("what is 2+2?")];
        let out = mock.complete(&messages).await.unwrap();
        assert!(out.contains("2+2"));
    }
}
