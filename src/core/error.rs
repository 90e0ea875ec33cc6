//! Agent 错误类型
//!
//! 决策解析失败（JsonParseError）由引擎就地降级为安全默认决策，不会中断交换；
//! 外部调用失败（超时、LLM、检索）则中止本次交换，不产出 final_answer。

use thiserror::Error;

/// 工作流运行过程中可能出现的错误（网络、解析、检索、配置等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Network timeout")]
    NetworkTimeout,

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    ConfigError(String),
}
