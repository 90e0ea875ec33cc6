//! LLM 层：补全客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、结构化输出辅助
//!
//! DeepSeek 提供与 OpenAI 完全兼容的 API，直接复用 OpenAiClient 并指向其端点。

pub mod mock;
pub mod openai;
pub mod structured;
pub mod traits;

use std::sync::Arc;

pub use mock::MockCompletionClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{CompletionClient, TokenStream};

use crate::config::AppConfig;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 根据配置与环境变量选择补全后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_completion_client(cfg: &AppConfig) -> Arc<dyn CompletionClient> {
    let provider = cfg.llm.provider.to_lowercase();
    // 有 DeepSeek Key，或配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
            .unwrap_or_else(|| cfg.llm.model.clone());
        let api_key = std::env::var("DEEPSEEK_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(OpenAiClient::new(
            Some(DEEPSEEK_BASE_URL),
            &model,
            api_key.as_deref(),
        ))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let base = cfg.llm.base_url.as_deref();
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            base,
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key found (DEEPSEEK_API_KEY / OPENAI_API_KEY), using mock LLM");
        Arc::new(MockCompletionClient)
    }
}
